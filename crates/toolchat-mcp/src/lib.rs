//! Tool protocol for toolchat: MCP over stdio.
//!
//! Newline-delimited JSON-RPC 2.0 between the chat client and a tool server
//! child process. Only the tool subset is implemented:
//! `initialize` → `notifications/initialized` → `tools/list` → `tools/call`.
//!
//! - [`transport::McpTransport`]: request/response framing over a child's stdio
//! - [`client::McpClient`]: handshake, tool discovery, tool calls
//! - [`server::serve`]: server loop dispatching to a [`server::ToolService`]

pub mod client;
pub mod error;
pub mod server;
pub mod transport;
pub mod types;

pub use client::McpClient;
pub use error::McpError;
pub use server::{serve, ToolService};
pub use transport::McpTransport;
pub use types::{McpContent, McpToolDef, McpToolResult, ServerInfo, PROTOCOL_VERSION};
