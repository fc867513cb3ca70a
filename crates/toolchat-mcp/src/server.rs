//! Protocol server loop.
//!
//! Reads one JSON-RPC message per line, dispatches `initialize`,
//! `tools/list`, `tools/call` and `ping` to a [`ToolService`], and writes one
//! response line per request. Notifications get no reply. EOF ends the loop.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::types::{
    JsonRpcError, JsonRpcMessage, McpToolDef, McpToolResult, ServerInfo, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};

/// The tools a server exposes.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Name and version reported in `initialize`.
    fn server_info(&self) -> ServerInfo;

    /// Descriptors returned by `tools/list`.
    fn list_tools(&self) -> Vec<McpToolDef>;

    /// Run a tool. Failures (including unknown names) are reported as
    /// results with `is_error` set.
    async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult;
}

/// Serve requests from `reader` until EOF, writing responses to `writer`.
pub async fn serve<S, R, W>(service: &S, reader: R, mut writer: W) -> anyhow::Result<()>
where
    S: ToolService + ?Sized,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let info = service.server_info();
    info!(server = %info.name, version = %info.version, "tool server ready");

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcMessage>(trimmed) {
            Ok(msg) => handle_message(service, &info, msg).await,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                Some(error_response(Value::Null, PARSE_ERROR, format!("Parse error: {e}")))
            }
        };

        if let Some(response) = response {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }

    info!("input closed, tool server exiting");
    Ok(())
}

/// Build the response for one message; `None` for notifications.
async fn handle_message<S: ToolService + ?Sized>(
    service: &S,
    info: &ServerInfo,
    msg: JsonRpcMessage,
) -> Option<Value> {
    let id = msg.id.filter(|v| !v.is_null());
    let Some(method) = msg.method else {
        // A response or garbage; nothing to answer.
        return id.map(|id| error_response(id, INVALID_REQUEST, "Invalid request".into()));
    };

    let Some(id) = id else {
        debug!(method = %method, "notification");
        return None;
    };

    let params = msg.params.unwrap_or_else(|| json!({}));
    let reply = match method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION),
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": info,
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": service.list_tools() })),
        "tools/call" => match params.get("name").and_then(Value::as_str) {
            Some(name) => {
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                debug!(tool = name, "tools/call");
                let result = service.call_tool(name, arguments).await;
                serde_json::to_value(result).map_err(|e| (INVALID_PARAMS, e.to_string()))
            }
            None => Err((INVALID_PARAMS, "tools/call requires a 'name'".to_string())),
        },
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    };

    Some(match reply {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => error_response(id, code, message),
    })
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": JsonRpcError { code, message, data: None },
    })
}
