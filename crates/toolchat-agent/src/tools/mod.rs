//! Agent tools.

pub mod base;
pub mod mcp;
pub mod registry;

pub use base::{require_string, Tool};
pub use mcp::{register_server_tools, McpTool};
pub use registry::ToolRegistry;
