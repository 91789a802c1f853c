//! fileagent - a provider-agnostic tool-calling agent runtime.
//!
//! The agent loop, conversation history and tool dispatch are written once
//! against the [`llm::ProviderAdapter`] contract; each backend family
//! (OpenAI-style and Anthropic-style) plugs in behind it.

pub mod agent;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod tools;
pub mod types;

pub use agent::{AgentEvent, AgentSession, LoopState, TurnOutcome};
pub use error::{AgentError, HistoryError, ToolError};
