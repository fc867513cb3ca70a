//! LLM Provider trait.
//!
//! Every chat backend implements this trait. `HttpProvider` covers all
//! OpenAI-compatible APIs, including Ollama's `/v1` endpoint.

use async_trait::async_trait;
use toolchat_core::config::AgentSettings;
use toolchat_core::types::{LlmResponse, Message, ToolDefinition};

/// Sampling parameters passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

impl From<&AgentSettings> for LlmRequestConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// On API errors, returns `LlmResponse::error(...)` instead of propagating,
    /// so the conversation keeps going with the error text as the reply.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> LlmResponse;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
