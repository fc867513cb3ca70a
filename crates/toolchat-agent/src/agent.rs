//! The conversational agent: an LLM ↔ tool-calling loop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use toolchat_core::config::AgentSettings;
use toolchat_core::types::{Message, ToolCall};
use toolchat_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::tools::ToolRegistry;

/// Reply used when the loop runs out of iterations without a final answer.
const NO_RESPONSE: &str = "I've completed processing but have no response to give.";

/// Something that turns prior context plus a new input into a reply.
#[async_trait]
pub trait Agent: Send + Sync {
    /// `history` is the conversation strictly before `input`.
    async fn invoke(&self, history: &[Message], input: &str) -> Result<String>;
}

// ─────────────────────────────────────────────
// ToolCallingAgent
// ─────────────────────────────────────────────

/// Agent bound to one model and one tool set.
pub struct ToolCallingAgent {
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    model: String,
    request_config: LlmRequestConfig,
    max_iterations: usize,
    system_prompt: Option<String>,
}

impl ToolCallingAgent {
    /// Create an agent. An empty `model` falls back to the provider's default.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        model: impl Into<String>,
        settings: &AgentSettings,
    ) -> Self {
        let model = model.into();
        let model = if model.is_empty() {
            provider.default_model().to_string()
        } else {
            model
        };

        info!(
            provider = provider.display_name(),
            model = %model,
            tools = tools.len(),
            "agent ready"
        );

        Self {
            provider,
            tools,
            model,
            request_config: LlmRequestConfig::from(settings),
            max_iterations: settings.max_tool_iterations.max(1) as usize,
            system_prompt: settings.system_prompt.clone(),
        }
    }

    fn build_messages(&self, history: &[Message], input: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(input));
        messages
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn invoke(&self, history: &[Message], input: &str) -> Result<String> {
        let mut messages = self.build_messages(history, input);
        let tool_defs = self.tools.get_definitions();

        for iteration in 0..self.max_iterations {
            debug!(iteration = iteration, "LLM call");

            let response = self
                .provider
                .chat(&messages, Some(&tool_defs), &self.model, &self.request_config)
                .await;

            if !response.has_tool_calls() {
                return Ok(response.content.unwrap_or_default());
            }

            let tool_calls: Vec<ToolCall> = response.tool_calls;
            messages.push(Message::assistant_tool_calls(
                response.content,
                tool_calls.clone(),
            ));

            for tc in &tool_calls {
                let params: HashMap<String, serde_json::Value> =
                    match serde_json::from_str(&tc.function.arguments) {
                        Ok(params) => params,
                        Err(e) => {
                            warn!(tool = %tc.function.name, error = %e, "unparseable tool arguments");
                            HashMap::new()
                        }
                    };

                info!(tool = %tc.function.name, iteration = iteration, "executing tool call");
                let result = self.tools.execute(&tc.function.name, params).await;
                debug!(tool = %tc.function.name, result_len = result.len(), "tool result");

                messages.push(Message::tool_result(&tc.id, result));
            }
        }

        warn!(max_iterations = self.max_iterations, "tool loop exhausted");
        Ok(NO_RESPONSE.to_string())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use toolchat_core::types::{LlmResponse, ToolDefinition};

    /// Returns canned responses in order and records what it was sent.
    struct MockProvider {
        responses: Mutex<Vec<LlmResponse>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl MockProvider {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn simple(text: &str) -> Self {
            Self::new(vec![LlmResponse {
                content: Some(text.into()),
                ..Default::default()
            }])
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn chat(
            &self,
            messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _model: &str,
            _config: &LlmRequestConfig,
        ) -> LlmResponse {
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                LlmResponse {
                    content: Some("(no more responses)".into()),
                    ..Default::default()
                }
            } else {
                responses.remove(0)
            }
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        fn display_name(&self) -> &str {
            "Mock"
        }
    }

    struct FixedDate;

    #[async_trait]
    impl Tool for FixedDate {
        fn name(&self) -> &str {
            "get_current_date"
        }
        fn description(&self) -> &str {
            "Today's date"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: HashMap<String, Value>) -> Result<String> {
            Ok("2024-02-29".into())
        }
    }

    fn settings(max_tool_iterations: u32) -> AgentSettings {
        AgentSettings {
            max_tool_iterations,
            ..Default::default()
        }
    }

    fn agent_with(provider: Arc<MockProvider>, max_iterations: u32) -> ToolCallingAgent {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FixedDate));
        ToolCallingAgent::new(provider, tools, "", &settings(max_iterations))
    }

    #[tokio::test]
    async fn test_simple_reply_and_context() {
        let provider = Arc::new(MockProvider::simple("hello"));
        let agent = agent_with(provider.clone(), 5);
        assert_eq!(agent.model, "mock-model");

        let history = vec![Message::user("a"), Message::assistant("b")];
        let reply = agent.invoke(&history, "c").await.unwrap();
        assert_eq!(reply, "hello");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            vec![Message::user("a"), Message::assistant("b"), Message::user("c")]
        );
    }

    #[tokio::test]
    async fn test_system_prompt_leads() {
        let provider = Arc::new(MockProvider::simple("ok"));
        let mut s = settings(5);
        s.system_prompt = Some("Be brief.".into());
        let agent = ToolCallingAgent::new(provider.clone(), ToolRegistry::new(), "m", &s);
        agent.invoke(&[], "hi").await.unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0][0], Message::system("Be brief."));
        assert_eq!(seen[0][1], Message::user("hi"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let provider = Arc::new(MockProvider::new(vec![
            LlmResponse {
                tool_calls: vec![ToolCall::new("call_1", "get_current_date", "{}")],
                ..Default::default()
            },
            LlmResponse {
                content: Some("Today is 2024-02-29.".into()),
                ..Default::default()
            },
        ]));
        let agent = agent_with(provider.clone(), 5);

        let reply = agent.invoke(&[], "what day is it?").await.unwrap();
        assert_eq!(reply, "Today is 2024-02-29.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1].last().unwrap(),
            &Message::tool_result("call_1", "2024-02-29")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(MockProvider::new(vec![
            LlmResponse {
                tool_calls: vec![ToolCall::new("call_1", "launch_rocket", "not json")],
                ..Default::default()
            },
            LlmResponse {
                content: Some("I can't do that.".into()),
                ..Default::default()
            },
        ]));
        let agent = agent_with(provider.clone(), 5);
        agent.invoke(&[], "launch").await.unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[1].last().unwrap(),
            &Message::tool_result("call_1", "Error: Tool 'launch_rocket' not found")
        );
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let call = ToolCall::new("call_loop", "get_current_date", "{}");
        let responses = (0..10)
            .map(|_| LlmResponse {
                tool_calls: vec![call.clone()],
                ..Default::default()
            })
            .collect();
        let provider = Arc::new(MockProvider::new(responses));
        let agent = agent_with(provider.clone(), 3);

        let reply = agent.invoke(&[], "loop").await.unwrap();
        assert_eq!(reply, NO_RESPONSE);
        assert_eq!(provider.seen.lock().unwrap().len(), 3);
    }
}
