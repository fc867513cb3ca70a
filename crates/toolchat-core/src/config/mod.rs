//! Configuration system: schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use toolchat_core::config;
//!
//! let cfg = config::load_config(None).expect("config");
//! println!("Model: {}", cfg.ai_model);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, save_config};
pub use schema::{AgentSettings, Config, ProviderConfig, RuntimeSettings};
