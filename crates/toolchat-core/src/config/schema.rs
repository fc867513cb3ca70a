//! Configuration schema.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! The two required settings are the tool server entry point (`serverPath`)
//! and the model identifier (`aiModel`); everything else has a default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default model when none is configured (served by a local Ollama).
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default tool server entry point (the `toolchat-tools` binary on `PATH`).
pub const DEFAULT_SERVER_PATH: &str = "toolchat-tools";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded once at startup from `config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Tool server entry point (an executable, or a script run by `serverCommand`).
    pub server_path: String,
    /// Optional launcher for `serverPath` (e.g. `"python"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_command: Option<String>,
    /// Extra arguments passed after the entry point.
    pub server_args: Vec<String>,
    /// Extra environment for the tool server; `${VAR}` references are expanded.
    pub server_env: HashMap<String, String>,
    /// Language model identifier.
    pub ai_model: String,
    pub provider: ProviderConfig,
    pub agent: AgentSettings,
    pub runtime: RuntimeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_path: DEFAULT_SERVER_PATH.to_string(),
            server_command: None,
            server_args: Vec::new(),
            server_env: HashMap::new(),
            ai_model: DEFAULT_MODEL.to_string(),
            provider: ProviderConfig::default(),
            agent: AgentSettings::default(),
            runtime: RuntimeSettings::default(),
        }
    }
}

impl Config {
    /// Program and arguments used to spawn the tool server.
    ///
    /// With a `serverCommand` the entry point becomes its first argument
    /// (`python server.py`); otherwise the entry point is executed directly.
    pub fn server_launch(&self) -> (String, Vec<String>) {
        match &self.server_command {
            Some(command) => {
                let mut args = Vec::with_capacity(self.server_args.len() + 1);
                args.push(self.server_path.clone());
                args.extend(self.server_args.iter().cloned());
                (command.clone(), args)
            }
            None => (self.server_path.clone(), self.server_args.clone()),
        }
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Connection settings for the LLM backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Provider name from the registry (e.g. `"ollama"`, `"openai"`).
    /// Detected from the model name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// API key for Bearer authentication (local backends ignore it).
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether an API key is set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Tool-calling agent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Maximum tool-calling loop iterations before forcing a response.
    pub max_tool_iterations: u32,
    /// Optional system prompt prepended to every invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            max_tool_iterations: 20,
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────

/// Timeouts for the background runtime and tool calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// Bounded wait for a single chat invocation; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoke_timeout_secs: Option<u64>,
    /// Per tool call timeout on the protocol channel.
    pub tool_timeout_secs: u64,
    /// Bound on cleanup and on joining the runtime thread at shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            invoke_timeout_secs: None,
            tool_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}
