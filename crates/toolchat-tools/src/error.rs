//! Tool failures the caller can tell apart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Error reading file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The weather service failed or answered with an error.
    #[error("Weather service error: {0}")]
    Upstream(String),

    #[error("Weather API key is not set (WEATHER_API)")]
    MissingKey,
}
