//! Agent side of toolchat.
//!
//! - [`tools`]: the `Tool` trait, the registry, and protocol-backed tools
//! - [`agent`]: the tool-calling agent that talks to the LLM
//! - [`transcript`]: the conversation history replayed on every invocation
//! - [`session`]: the live bundle of tool server, agent and transcript
//! - [`runtime`]: the background runtime thread and the blocking bridge into it

pub mod agent;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod transcript;

pub use agent::{Agent, ToolCallingAgent};
pub use runtime::{AgentRuntime, PendingReply, RuntimeError, RuntimeHandle, NOT_READY};
pub use session::{bootstrap, Session};
pub use transcript::Transcript;
