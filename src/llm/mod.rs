//! Provider adapters and the model client.
//!
//! A `ProviderAdapter` is the only place that knows a backend's message and
//! tool-call shapes. It turns the neutral history into a request body,
//! turns the response body back into a `ProviderResponse`, and appends the
//! backend-specific tool-call and tool-result turns.
//!
//! Sending the body over the network is the `ModelClient`'s job (see
//! [`client`]), so adapters are plain synchronous translators.

pub mod anthropic;
pub mod client;
pub mod openai;

use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::AgentError;
use crate::history::ConversationHistory;
use crate::types::{ProviderKind, ProviderRequest, ProviderResponse, ToolCallBatch, ToolDescriptor, ToolInvocation};

pub use anthropic::AnthropicAdapter;
pub use client::{AzureDeployment, HttpModelClient, ModelClient};
pub use openai::OpenAiAdapter;

pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Display name, used in logs and protocol errors.
    fn name(&self) -> &str;

    /// Build the provider request for the current history.
    fn translate_outbound(
        &self,
        history: &ConversationHistory,
        system_prompt: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ProviderRequest, AgentError>;

    /// Interpret a provider response body.
    fn translate_inbound(&self, response: Value) -> Result<ProviderResponse, AgentError>;

    /// Record the assistant turn that requested `calls`.
    fn append_assistant_tool_call_turn(
        &self,
        history: &mut ConversationHistory,
        preamble: Option<&str>,
        calls: &ToolCallBatch,
    ) -> Result<(), AgentError>;

    /// Record the result of one invocation.
    fn append_tool_result_turn(
        &self,
        history: &mut ConversationHistory,
        invocation: &ToolInvocation,
        result_text: &str,
    ) -> Result<(), AgentError>;
}

/// Create the adapter selected by `config.provider`.
pub fn create_adapter(config: &LlmConfig) -> Result<Box<dyn ProviderAdapter>, AgentError> {
    if config.model.trim().is_empty() {
        return Err(AgentError::Configuration("llm.model must not be empty".to_string()));
    }
    match config.provider.parse::<ProviderKind>()? {
        ProviderKind::OpenAi => Ok(Box::new(OpenAiAdapter::new(
            config.model.clone(),
            config.max_tokens,
        ))),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicAdapter::new(
            config.model.clone(),
            config.max_tokens,
        ))),
    }
}
