//! The live session: tool server channel, agent, and transcript.
//!
//! Exactly one session exists per process. It is built by [`bootstrap`] on
//! the runtime thread and owned by that thread until cleanup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use toolchat_core::config::Config;
use toolchat_core::types::Turn;
use toolchat_core::utils::expand_home;
use toolchat_mcp::{McpClient, ServerInfo};
use toolchat_providers::create_provider;

use crate::agent::{Agent, ToolCallingAgent};
use crate::tools::{register_server_tools, ToolRegistry};
use crate::transcript::Transcript;

/// Name reported to the tool server during the handshake.
const CLIENT_NAME: &str = "toolchat";

pub struct Session {
    client: Option<Arc<McpClient>>,
    close_grace: Duration,
    tool_names: Vec<String>,
    agent: Box<dyn Agent>,
    transcript: Transcript,
}

impl Session {
    /// A session with no tool server attached.
    pub fn new(agent: Box<dyn Agent>, tool_names: Vec<String>) -> Self {
        Self {
            client: None,
            close_grace: Duration::from_secs(5),
            tool_names,
            agent,
            transcript: Transcript::new(),
        }
    }

    /// Attach the tool server channel; `close()` releases it within `grace`.
    pub fn with_client(mut self, client: Arc<McpClient>, grace: Duration) -> Self {
        self.client = Some(client);
        self.close_grace = grace;
        self
    }

    /// Run one exchange.
    ///
    /// The agent sees the transcript as it was before this exchange; the
    /// exchange is recorded only once the agent has replied.
    pub async fn invoke(&mut self, input: &str) -> Result<String> {
        let history = self.transcript.messages();
        let reply = self.agent.invoke(&history, input).await?;
        self.transcript.record_turn(input, reply.as_str());
        Ok(reply)
    }

    pub fn reset(&mut self) {
        self.transcript.reset();
        debug!("transcript cleared");
    }

    pub fn transcript(&self) -> &[Turn] {
        self.transcript.turns()
    }

    /// Tools negotiated with the server at startup.
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Release resources in reverse order of acquisition: the transcript,
    /// then the tool server channel. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        self.transcript.reset();
        if let Some(client) = self.client.take() {
            client.close(self.close_grace).await?;
            info!("tool server channel closed");
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Bootstrap
// ─────────────────────────────────────────────

/// Start the tool server, run the handshake, load its tools, and build the
/// agent. Any failure is fatal to startup.
pub async fn bootstrap(config: &Config) -> Result<Session> {
    let (program, args) = config.server_launch();
    let program = resolve_server_program(&program);
    info!(program = %program.display(), args = ?args, "starting tool server");

    let client = McpClient::spawn(
        &program.to_string_lossy(),
        &args,
        &config.server_env,
        None,
        ServerInfo::new(CLIENT_NAME, env!("CARGO_PKG_VERSION")),
    )
    .await
    .with_context(|| format!("failed to connect to tool server {}", program.display()))?;
    let client = Arc::new(client);
    let grace = Duration::from_secs(config.runtime.shutdown_timeout_secs);

    let mut registry = ToolRegistry::new();
    let count = register_server_tools(
        &mut registry,
        &client,
        Duration::from_secs(config.runtime.tool_timeout_secs),
    );
    let tool_names = registry.tool_names();
    info!(count = count, tools = ?tool_names, "loaded tools");

    let provider = match create_provider(&config.ai_model, &config.provider) {
        Ok(provider) => provider,
        Err(e) => {
            if let Err(close_err) = client.close(grace).await {
                warn!(error = %close_err, "failed to close tool server after startup error");
            }
            return Err(e.context("failed to create LLM provider"));
        }
    };

    let agent = ToolCallingAgent::new(Arc::new(provider), registry, &config.ai_model, &config.agent);
    Ok(Session::new(Box::new(agent), tool_names).with_client(client, grace))
}

/// Expand `~`, and prefer a bare program name sitting next to our own
/// executable over a `PATH` lookup.
fn resolve_server_program(program: &str) -> PathBuf {
    let expanded = expand_home(program);
    if expanded.components().count() != 1 {
        return expanded;
    }
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&expanded)));
    match sibling {
        Some(path) if path.is_file() => path,
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use toolchat_core::types::Message;
    use toolchat_mcp::{serve, McpToolDef, McpToolResult, McpTransport, ToolService};

    /// Replies `"<input>!"` and records the history it was given.
    struct Recorder {
        seen: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    #[async_trait]
    impl Agent for Recorder {
        async fn invoke(&self, history: &[Message], input: &str) -> Result<String> {
            self.seen.lock().unwrap().push(history.to_vec());
            Ok(format!("{input}!"))
        }
    }

    struct Failing;

    #[async_trait]
    impl Agent for Failing {
        async fn invoke(&self, _history: &[Message], _input: &str) -> Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn test_context_is_strictly_prior_history() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(Box::new(Recorder { seen: seen.clone() }), vec![]);
        session.transcript.record_turn("a", "b");

        let reply = session.invoke("c").await.unwrap();
        assert_eq!(seen.lock().unwrap()[0], vec![Message::user("a"), Message::assistant("b")]);
        assert_eq!(
            session.transcript(),
            &[
                Turn::user("a"),
                Turn::assistant("b"),
                Turn::user("c"),
                Turn::assistant(reply)
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_invoke_records_nothing() {
        let mut session = Session::new(Box::new(Failing), vec![]);
        assert!(session.invoke("hi").await.is_err());
        assert!(session.transcript().is_empty());
    }

    struct NoTools;

    #[async_trait]
    impl ToolService for NoTools {
        fn server_info(&self) -> ServerInfo {
            ServerInfo::new("empty", "0")
        }
        fn list_tools(&self) -> Vec<McpToolDef> {
            Vec::new()
        }
        async fn call_tool(&self, name: &str, _arguments: serde_json::Value) -> McpToolResult {
            McpToolResult::error(format!("Unknown tool: {name}"))
        }
    }

    #[tokio::test]
    async fn test_close_twice() {
        let (ours, theirs) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (r, w) = tokio::io::split(theirs);
            serve(&NoTools, r, w).await
        });
        let (r, w) = tokio::io::split(ours);
        let client = McpClient::connect(
            McpTransport::from_streams(Box::new(r), Box::new(w)),
            ServerInfo::new("test", "0"),
        )
        .await
        .unwrap();
        let client = Arc::new(client);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(Box::new(Recorder { seen }), vec![])
            .with_client(client.clone(), Duration::from_millis(50));
        session.invoke("x").await.unwrap();

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(client.is_closed().await);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_fails_for_missing_server() {
        let config = Config {
            server_path: "/nonexistent/toolchat-tools".into(),
            ..Default::default()
        };
        let err = bootstrap(&config).await.err().unwrap();
        assert!(format!("{err:#}").contains("failed to connect to tool server"));
    }

    #[test]
    fn test_resolve_server_program_keeps_paths() {
        assert_eq!(
            resolve_server_program("/opt/tools/server"),
            PathBuf::from("/opt/tools/server")
        );
        assert_eq!(
            resolve_server_program("definitely-not-a-sibling"),
            PathBuf::from("definitely-not-a-sibling")
        );
    }
}
