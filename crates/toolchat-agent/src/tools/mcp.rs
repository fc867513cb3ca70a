//! Tools served by the tool server process, wrapped as local [`Tool`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use toolchat_mcp::{McpClient, McpToolDef};

use super::base::Tool;
use super::registry::ToolRegistry;

/// One remote tool. Calls go through the shared client with a timeout.
pub struct McpTool {
    def: McpToolDef,
    client: Arc<McpClient>,
    timeout: Duration,
}

impl McpTool {
    pub fn new(def: McpToolDef, client: Arc<McpClient>, timeout: Duration) -> Self {
        Self {
            def,
            client,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn parameters(&self) -> Value {
        if self.def.input_schema.is_object() {
            self.def.input_schema.clone()
        } else {
            json!({"type": "object", "properties": {}})
        }
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let arguments = Value::Object(params.into_iter().collect());
        debug!(tool = %self.def.name, "calling remote tool");

        let result = tokio::time::timeout(self.timeout, self.client.call_tool(&self.def.name, arguments))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "call to '{}' timed out after {}s",
                    self.def.name,
                    self.timeout.as_secs()
                )
            })??;

        if result.is_error {
            anyhow::bail!(result.to_text());
        }
        Ok(result.to_text())
    }
}

/// Register every tool the client discovered. Returns how many were added.
pub fn register_server_tools(
    registry: &mut ToolRegistry,
    client: &Arc<McpClient>,
    timeout: Duration,
) -> usize {
    let defs = client.tools().to_vec();
    let count = defs.len();
    for def in defs {
        registry.register(Arc::new(McpTool::new(def, Arc::clone(client), timeout)));
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolchat_mcp::{serve, McpToolResult, McpTransport, ServerInfo, ToolService};

    struct Remote;

    #[async_trait]
    impl ToolService for Remote {
        fn server_info(&self) -> ServerInfo {
            ServerInfo::new("remote", "0")
        }

        fn list_tools(&self) -> Vec<McpToolDef> {
            vec![
                McpToolDef {
                    name: "shout".into(),
                    description: "Uppercase".into(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {"text": {"type": "string"}}
                    }),
                },
                McpToolDef {
                    name: "stall".into(),
                    description: "Never answers in time".into(),
                    input_schema: Value::Null,
                },
            ]
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult {
            match (name, arguments["text"].as_str()) {
                ("shout", Some(text)) => McpToolResult::text(text.to_uppercase()),
                ("shout", None) => McpToolResult::error("Missing required parameter: text"),
                _ => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    McpToolResult::text("late")
                }
            }
        }
    }

    async fn client() -> Arc<McpClient> {
        let (ours, theirs) = tokio::io::duplex(16 * 1024);
        tokio::spawn(async move {
            let (r, w) = tokio::io::split(theirs);
            serve(&Remote, r, w).await
        });
        let (r, w) = tokio::io::split(ours);
        let transport = McpTransport::from_streams(Box::new(r), Box::new(w));
        Arc::new(
            McpClient::connect(transport, ServerInfo::new("test", "0"))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let client = client().await;
        let mut registry = ToolRegistry::new();
        let added = register_server_tools(&mut registry, &client, Duration::from_secs(1));
        assert_eq!(added, 2);
        assert_eq!(registry.tool_names(), vec!["shout", "stall"]);

        let mut params = HashMap::new();
        params.insert("text".into(), json!("hi"));
        assert_eq!(registry.call("shout", params).await.unwrap(), "HI");
    }

    #[tokio::test]
    async fn test_error_result_becomes_err() {
        let client = client().await;
        let tool = McpTool::new(client.tools()[0].clone(), client, Duration::from_secs(1));
        let err = tool.execute(HashMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: text");
    }

    #[tokio::test]
    async fn test_missing_schema_gets_empty_object() {
        let client = client().await;
        let tool = McpTool::new(client.tools()[1].clone(), client, Duration::from_secs(1));
        assert_eq!(tool.parameters()["type"], "object");
    }

    #[tokio::test]
    async fn test_timeout() {
        let client = client().await;
        let tool = McpTool::new(client.tools()[1].clone(), client, Duration::from_millis(50));
        let err = tool.execute(HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
