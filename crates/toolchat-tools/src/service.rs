//! Exposes a [`ToolRegistry`] over the tool protocol.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use toolchat_agent::tools::ToolRegistry;
use toolchat_mcp::{McpToolDef, McpToolResult, ServerInfo, ToolService};

pub struct ToolServer {
    info: ServerInfo,
    registry: ToolRegistry,
}

impl ToolServer {
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        Self { info, registry }
    }
}

#[async_trait]
impl ToolService for ToolServer {
    fn server_info(&self) -> ServerInfo {
        self.info.clone()
    }

    fn list_tools(&self) -> Vec<McpToolDef> {
        self.registry
            .get_definitions()
            .into_iter()
            .map(|def| McpToolDef {
                name: def.function.name,
                description: def.function.description,
                input_schema: def.function.parameters,
            })
            .collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult {
        let params: HashMap<String, Value> = match arguments {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => HashMap::new(),
            other => {
                return McpToolResult::error(format!(
                    "Invalid parameters: arguments must be an object, got {other}"
                ))
            }
        };

        match self.registry.call(name, params).await {
            Ok(text) => {
                info!(tool = name, "tool call succeeded");
                McpToolResult::text(text)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                McpToolResult::error(e.to_string())
            }
        }
    }
}
