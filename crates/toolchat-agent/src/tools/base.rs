//! The `Tool` trait and argument helpers.
//!
//! The same trait backs both sides of the protocol: the agent wraps each
//! remote tool as a [`Tool`], and the tool server implements its operations
//! as [`Tool`]s behind a registry.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use toolchat_core::types::ToolDefinition;

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool, e.g. `"read_txt_file"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema object for the arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. `Err` is reported to the caller as a failed call.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    /// Definition sent to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required string argument.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}
