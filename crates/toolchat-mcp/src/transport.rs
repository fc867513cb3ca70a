//! Stdio transport: newline-delimited JSON-RPC over a child process's pipes.
//!
//! The transport also accepts arbitrary async streams so the client can be
//! driven against an in-process server in tests.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::McpError;
use crate::types::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Both pipe ends, locked together so one request's write and read never
/// interleave with another's.
struct Channel {
    /// `None` once the transport is closed.
    writer: Option<BoxedWriter>,
    reader: BufReader<BoxedReader>,
}

/// Request/response transport to a tool server.
pub struct McpTransport {
    channel: Mutex<Channel>,
    /// Child process, when the transport owns one.
    child: Mutex<Option<Child>>,
    next_id: AtomicU64,
}

impl McpTransport {
    /// Spawn a tool server process and talk to it over stdin/stdout.
    ///
    /// stderr is inherited so the server's logs reach the terminal.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in resolve_env(env) {
            cmd.env(key, value);
        }
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn tool server: {command}"))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open tool server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open tool server stdout"))?;

        debug!(command = command, pid = ?child.id(), "spawned tool server");

        let mut transport = Self::from_streams(Box::new(stdout), Box::new(stdin));
        transport.child = Mutex::new(Some(child));
        Ok(transport)
    }

    /// Wrap an existing pair of streams (no child process).
    pub fn from_streams(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            channel: Mutex::new(Channel {
                writer: Some(writer),
                reader: BufReader::new(reader),
            }),
            child: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a request and wait for the response with the same id.
    ///
    /// Server notifications and stray responses arriving in between are
    /// logged and skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;
        debug!(method = method, id = id, "MCP request");

        let mut channel = self.channel.lock().await;
        write_line(&mut channel, &line).await?;

        loop {
            let mut buf = String::new();
            let n = channel.reader.read_line(&mut buf).await?;
            if n == 0 {
                return Err(McpError::Closed);
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let msg: JsonRpcMessage = serde_json::from_str(trimmed)?;
            if msg.id.as_ref().and_then(Value::as_u64) != Some(id) || msg.method.is_some() {
                warn!(line = trimmed, "skipping unexpected MCP message");
                continue;
            }

            if let Some(error) = msg.error {
                return Err(McpError::Remote {
                    code: error.code,
                    message: error.message,
                });
            }
            return msg.result.ok_or(McpError::MissingResult);
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        })?;
        debug!(method = method, "MCP notification");

        let mut channel = self.channel.lock().await;
        write_line(&mut channel, &line).await
    }

    /// Close the channel: end stdin, give the child `grace` to exit, then kill it.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn close(&self, grace: Duration) -> anyhow::Result<()> {
        {
            let mut channel = self.channel.lock().await;
            if let Some(mut writer) = channel.writer.take() {
                // EOF on the server's stdin is its signal to exit.
                let _ = writer.shutdown().await;
            }
        }

        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "tool server exited"),
                Ok(Err(e)) => warn!(error = %e, "failed to wait for tool server"),
                Err(_) => {
                    warn!("tool server did not exit in time, killing it");
                    child.kill().await.context("failed to kill tool server")?;
                }
            }
        }
        Ok(())
    }

    /// Whether `close()` has run.
    pub async fn is_closed(&self) -> bool {
        self.channel.lock().await.writer.is_none()
    }
}

async fn write_line(channel: &mut Channel, line: &str) -> Result<(), McpError> {
    let writer = channel.writer.as_mut().ok_or(McpError::Closed)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Expand `${VAR}` references from the current environment.
/// Unknown variables are left as-is.
pub fn expand_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// Expand the configured child environment. Entries that still reference an
/// unset variable are dropped so the child falls back to what it inherits.
fn resolve_env(env: &HashMap<String, String>) -> Vec<(String, String)> {
    env.iter()
        .filter_map(|(key, value)| {
            let expanded = expand_env_vars(value);
            if has_placeholder(&expanded) {
                warn!(key = %key, "not forwarding env entry with an unset ${{...}} reference");
                None
            } else {
                Some((key.clone(), expanded))
            }
        })
        .collect()
}

fn has_placeholder(value: &str) -> bool {
    value
        .find("${")
        .is_some_and(|start| value[start..].contains('}'))
}
