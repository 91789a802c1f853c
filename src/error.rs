//! Error types for the agent runtime.
//!
//! `AgentError` is what the agent loop and adapters return. Tool failures
//! are deliberately separate (`ToolError`): they are rendered into the tool
//! result text and never abort a turn.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Unsupported or misconfigured backend. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A provider response the adapter could not interpret.
    #[error("protocol error from {provider}: {reason}")]
    Protocol { provider: String, reason: String },
    /// The model client failed to deliver the request or response.
    #[error("transport error: {0}")]
    Transport(String),
    /// An append would have broken the conversation invariants.
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl AgentError {
    pub fn protocol(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether the session can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AgentError::Configuration(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("system turns are not accepted in the conversation history")]
    SystemTurn,
    #[error("tool result references unknown or already answered call '{0}'")]
    UnknownToolResult(String),
    #[error("{0} tool call(s) are still waiting for results")]
    UnansweredToolCalls(usize),
    #[error("duplicate tool call id '{0}'")]
    DuplicateToolCallId(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Missing required parameter for '{tool}': {name}")]
    MissingArgument { tool: String, name: String },
    #[error("Invalid parameter '{name}' for '{tool}': {reason}")]
    InvalidArgument {
        tool: String,
        name: String,
        reason: String,
    },
}
