//! toolchat core: shared message types, configuration, and path helpers.
//!
//! - **types**: OpenAI-format chat messages, tool calls, conversation turns
//! - **config**: `config.json` schema and loader
//! - **utils**: path expansion helpers

pub mod config;
pub mod types;
pub mod utils;

pub use config::Config;
pub use types::{Message, Role, ToolCall, ToolDefinition, Turn};
