//! Protocol errors.

use thiserror::Error;

/// Errors raised by the protocol client.
#[derive(Debug, Error)]
pub enum McpError {
    /// The peer answered with a JSON-RPC error object.
    #[error("MCP error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The channel was closed (EOF on read, or `close()` already called).
    #[error("MCP channel closed")]
    Closed,

    /// A line could not be parsed as a JSON-RPC message.
    #[error("malformed MCP message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The response had neither `result` nor `error`.
    #[error("MCP response missing result")]
    MissingResult,

    #[error("MCP I/O error: {0}")]
    Io(#[from] std::io::Error),
}
