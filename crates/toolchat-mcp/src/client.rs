//! Protocol client: handshake, tool discovery, and tool calls.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::{InitializeResult, McpToolDef, McpToolResult, ServerInfo, PROTOCOL_VERSION};

/// A connected, initialized tool server.
pub struct McpClient {
    transport: McpTransport,
    server_info: Option<ServerInfo>,
    tools: Vec<McpToolDef>,
}

impl McpClient {
    /// Spawn `command` and run the handshake.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
        client_info: ServerInfo,
    ) -> Result<Self> {
        let transport = McpTransport::spawn(command, args, env, working_dir).await?;
        Self::connect(transport, client_info).await
    }

    /// Run `initialize`, send `notifications/initialized`, then `tools/list`.
    pub async fn connect(transport: McpTransport, client_info: ServerInfo) -> Result<Self> {
        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": client_info,
                })),
            )
            .await
            .context("tool server handshake failed")?;

        let init: InitializeResult =
            serde_json::from_value(init).context("invalid initialize result")?;
        if init.protocol_version != PROTOCOL_VERSION {
            warn!(
                server = %init.protocol_version,
                client = PROTOCOL_VERSION,
                "tool server negotiated a different protocol version"
            );
        }

        transport
            .notify("notifications/initialized", None)
            .await
            .context("failed to confirm initialization")?;

        let tools = if init.capabilities.tools.is_some() {
            let listed = transport
                .request("tools/list", None)
                .await
                .context("failed to list tools")?;
            parse_tool_list(listed)?
        } else {
            warn!("tool server does not advertise tools");
            Vec::new()
        };

        info!(
            server = init.server_info.as_ref().map_or("?", |s| s.name.as_str()),
            tools = tools.len(),
            "connected to tool server"
        );

        Ok(Self {
            transport,
            server_info: init.server_info,
            tools,
        })
    }

    /// Tools discovered during the handshake.
    pub fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Call a tool by name.
    ///
    /// Tool-level failures come back as `Ok` with `is_error` set; `Err` means
    /// the protocol itself failed.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments,
                })),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Close the channel and reap the server process. Idempotent.
    pub async fn close(&self, grace: Duration) -> Result<()> {
        self.transport.close(grace).await
    }

    pub async fn is_closed(&self) -> bool {
        self.transport.is_closed().await
    }
}

fn parse_tool_list(listed: Value) -> Result<Vec<McpToolDef>> {
    let tools = listed
        .get("tools")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("tools/list result has no 'tools' field"))?;
    serde_json::from_value(tools).context("invalid tool descriptors")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{serve, ToolService};
    use async_trait::async_trait;

    /// Two tools: `echo` and `fail`.
    struct EchoService;

    #[async_trait]
    impl ToolService for EchoService {
        fn server_info(&self) -> ServerInfo {
            ServerInfo::new("echo-server", "0.0.1")
        }

        fn list_tools(&self) -> Vec<McpToolDef> {
            vec![
                McpToolDef {
                    name: "echo".into(),
                    description: "Echo the text back".into(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"]
                    }),
                },
                McpToolDef {
                    name: "fail".into(),
                    description: "Always fails".into(),
                    input_schema: json!({"type": "object", "properties": {}}),
                },
            ]
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult {
            match name {
                "echo" => McpToolResult::text(
                    arguments["text"].as_str().unwrap_or_default().to_string(),
                ),
                _ => McpToolResult::error("intentional failure"),
            }
        }
    }

    async fn connected() -> (McpClient, tokio::task::JoinHandle<Result<()>>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(async move {
            let (r, w) = tokio::io::split(server_io);
            serve(&EchoService, r, w).await
        });
        let (r, w) = tokio::io::split(client_io);
        let transport = McpTransport::from_streams(Box::new(r), Box::new(w));
        let client = McpClient::connect(transport, ServerInfo::new("test", "0"))
            .await
            .unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_handshake_discovers_tools() {
        let (client, _server) = connected().await;
        let names: Vec<&str> = client.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
        assert_eq!(client.server_info().unwrap().name, "echo-server");
    }

    #[tokio::test]
    async fn test_call_tool_roundtrip() {
        let (client, _server) = connected().await;
        let result = client.call_tool("echo", json!({"text": "hi"})).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.to_text(), "hi");
    }

    #[tokio::test]
    async fn test_tool_failure_is_result_not_error() {
        let (client, _server) = connected().await;
        let result = client.call_tool("fail", json!({})).await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.to_text(), "intentional failure");
    }

    #[tokio::test]
    async fn test_close_ends_server_and_is_idempotent() {
        let (client, server) = connected().await;
        client.close(Duration::from_millis(50)).await.unwrap();
        client.close(Duration::from_millis(50)).await.unwrap();
        assert!(client.is_closed().await);
        // EOF on its input ends the server loop cleanly.
        server.await.unwrap().unwrap();
        assert!(matches!(
            client.call_tool("echo", json!({"text": "late"})).await,
            Err(McpError::Closed)
        ));
    }

    #[test]
    fn test_parse_tool_list_requires_tools_field() {
        assert!(parse_tool_list(json!({})).is_err());
        assert!(parse_tool_list(json!({"tools": []})).unwrap().is_empty());
    }
}
