//! Chat surface event handlers.
//!
//! The display history shown to the user is kept here, separate from the
//! transcript the agent sees.

use std::time::Duration;

use toolchat_agent::{RuntimeError, RuntimeHandle};
use toolchat_core::types::Turn;

/// What the handlers need from the agent runtime.
pub trait ChatBackend {
    fn invoke(&self, text: &str) -> Result<String, RuntimeError>;
    fn reset(&self) -> Result<(), RuntimeError>;
    fn tool_names(&self) -> Result<Vec<String>, RuntimeError>;
}

/// The runtime bridge, with an optional bound on each invocation.
pub struct Bridge {
    handle: RuntimeHandle,
    timeout: Option<Duration>,
}

impl Bridge {
    pub fn new(handle: RuntimeHandle, timeout: Option<Duration>) -> Self {
        Self { handle, timeout }
    }
}

impl ChatBackend for Bridge {
    fn invoke(&self, text: &str) -> Result<String, RuntimeError> {
        match self.timeout {
            Some(timeout) => self.handle.invoke_timeout(text, timeout),
            None => self.handle.invoke(text),
        }
    }

    fn reset(&self) -> Result<(), RuntimeError> {
        self.handle.reset()
    }

    fn tool_names(&self) -> Result<Vec<String>, RuntimeError> {
        self.handle.tool_names()
    }
}

pub struct ChatHandlers<B> {
    backend: B,
}

impl<B: ChatBackend> ChatHandlers<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Send `input` and append the exchange to the display history.
    /// Returns the cleared input and the updated history.
    pub fn on_submit(
        &self,
        input: &str,
        mut history: Vec<Turn>,
    ) -> Result<(String, Vec<Turn>), RuntimeError> {
        let reply = self.backend.invoke(input)?;
        history.push(Turn::user(input));
        history.push(Turn::assistant(reply));
        Ok((String::new(), history))
    }

    /// Clear the agent's transcript and the display history.
    pub fn on_reset(&self) -> Result<(String, Vec<Turn>), RuntimeError> {
        self.backend.reset()?;
        Ok((String::new(), Vec::new()))
    }
}
