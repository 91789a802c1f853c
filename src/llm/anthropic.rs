//! Anthropic (Messages API) adapter.
//!
//! Anthropic uses a different format than OpenAI:
//! - the system prompt is a top-level field, not a message
//! - tool definitions use "input_schema" instead of "parameters"
//! - assistant tool requests are "tool_use" content blocks, possibly
//!   interleaved with "text" blocks
//! - tool results are sent as user messages with "tool_result" content
//!   blocks, and all results for one assistant turn must arrive in the
//!   next user message

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::ProviderAdapter;
use crate::error::{AgentError, HistoryError};
use crate::history::ConversationHistory;
use crate::types::{
    Content, ContentBlock, ProviderKind, ProviderRequest, ProviderResponse, Role, ToolCallBatch,
    ToolDescriptor, ToolInvocation, Turn,
};

const NAME: &str = "Anthropic";

pub struct AnthropicAdapter {
    model: String,
    max_tokens: u32,
}

// --- API Request Types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

/// Content can be a simple string or an array of content blocks.
#[derive(Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ApiMessage {
    fn is_tool_results(&self) -> bool {
        match &self.content {
            ApiContent::Blocks(blocks) => {
                self.role == "user"
                    && !blocks.is_empty()
                    && blocks
                        .iter()
                        .all(|b| matches!(b, ContentBlock::ToolResult { .. }))
            }
            ApiContent::Text(_) => false,
        }
    }
}

#[derive(Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Thinking and other block types carry nothing the loop needs.
    #[serde(other)]
    Other,
}

// --- Implementation ---

impl AnthropicAdapter {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
        }
    }

    fn convert_turn(&self, turn: &Turn) -> Result<ApiMessage, AgentError> {
        let message = match turn.role {
            Role::System => return Err(HistoryError::SystemTurn.into()),
            Role::User => ApiMessage {
                role: "user",
                content: match &turn.content {
                    Content::PlainText(text) => ApiContent::Text(text.clone()),
                    Content::Blocks(blocks) => ApiContent::Blocks(blocks.clone()),
                },
            },
            Role::Assistant => {
                if turn.tool_calls.is_empty() {
                    ApiMessage {
                        role: "assistant",
                        content: match &turn.content {
                            Content::PlainText(text) => ApiContent::Text(text.clone()),
                            Content::Blocks(blocks) => ApiContent::Blocks(blocks.clone()),
                        },
                    }
                } else {
                    // OpenAI-shaped turn: rebuild it as text + tool_use blocks.
                    let mut blocks = match &turn.content {
                        Content::PlainText(text) if text.is_empty() => Vec::new(),
                        Content::PlainText(text) => vec![ContentBlock::Text { text: text.clone() }],
                        Content::Blocks(blocks) => blocks.clone(),
                    };
                    for call in &turn.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: Value::Object(call.arguments.clone()),
                        });
                    }
                    ApiMessage {
                        role: "assistant",
                        content: ApiContent::Blocks(blocks),
                    }
                }
            }
            Role::Tool => {
                let tool_use_id = turn.tool_call_id.clone().ok_or_else(|| {
                    AgentError::protocol(NAME, "tool turn without a tool_call_id")
                })?;
                ApiMessage {
                    role: "user",
                    content: ApiContent::Blocks(vec![ContentBlock::ToolResult {
                        tool_use_id,
                        content: turn.content.text(),
                    }]),
                }
            }
        };
        Ok(message)
    }
}

/// Append `message`, folding consecutive tool-result user messages together.
fn push_message(messages: &mut Vec<ApiMessage>, message: ApiMessage) {
    if message.is_tool_results() {
        if let Some(last) = messages.last_mut() {
            if last.is_tool_results() {
                if let (ApiContent::Blocks(existing), ApiContent::Blocks(new)) =
                    (&mut last.content, message.content)
                {
                    existing.extend(new);
                }
                return;
            }
        }
    }
    messages.push(message);
}

fn decode_input(tool: &str, input: Value) -> Result<Map<String, Value>, AgentError> {
    match input {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(AgentError::protocol(
            NAME,
            format!("input for tool '{}' is not an object: {}", tool, other),
        )),
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn name(&self) -> &str {
        NAME
    }

    fn translate_outbound(
        &self,
        history: &ConversationHistory,
        system_prompt: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ProviderRequest, AgentError> {
        let mut messages = Vec::with_capacity(history.len());
        for turn in history.turns() {
            push_message(&mut messages, self.convert_turn(turn)?);
        }

        let tools = tools
            .iter()
            .map(|t| ApiTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema(),
            })
            .collect();

        let request = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: Some(system_prompt).filter(|s| !s.trim().is_empty()),
            messages,
            tools,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AgentError::protocol(NAME, format!("failed to encode request: {}", e)))?;

        Ok(ProviderRequest {
            provider: ProviderKind::Anthropic,
            body,
        })
    }

    fn translate_inbound(&self, response: Value) -> Result<ProviderResponse, AgentError> {
        if response.get("type").and_then(|t| t.as_str()) == Some("error") {
            let message = response
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| response.to_string());
            return Err(AgentError::protocol(NAME, format!("API error: {}", message)));
        }

        let api_response: ApiResponse = serde_json::from_value(response)
            .map_err(|e| AgentError::protocol(NAME, format!("unexpected response shape: {}", e)))?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in api_response.content {
            match block {
                ResponseBlock::Text { text: t } => text.push_str(&t),
                ResponseBlock::ToolUse { id, name, input } => {
                    let arguments = decode_input(&name, input)?;
                    calls.push(ToolInvocation::new(id, name, arguments));
                }
                ResponseBlock::Other => {}
            }
        }
        debug!(
            stop_reason = ?api_response.stop_reason,
            tool_calls = calls.len(),
            "Anthropic response received"
        );

        Ok(match ToolCallBatch::new(calls) {
            Some(calls) => ProviderResponse::ToolCalls {
                preamble: Some(text).filter(|t| !t.trim().is_empty()),
                calls,
            },
            None => ProviderResponse::Text(text),
        })
    }

    fn append_assistant_tool_call_turn(
        &self,
        history: &mut ConversationHistory,
        preamble: Option<&str>,
        calls: &ToolCallBatch,
    ) -> Result<(), AgentError> {
        let mut blocks = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = preamble.filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::Text {
                text: text.to_string(),
            });
        }
        for call in calls {
            blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: Value::Object(call.arguments.clone()),
            });
        }
        history.push(Turn::blocks(Role::Assistant, blocks))?;
        Ok(())
    }

    fn append_tool_result_turn(
        &self,
        history: &mut ConversationHistory,
        invocation: &ToolInvocation,
        result_text: &str,
    ) -> Result<(), AgentError> {
        history.push(Turn::blocks(
            Role::User,
            vec![ContentBlock::ToolResult {
                tool_use_id: invocation.id.clone(),
                content: result_text.to_string(),
            }],
        ))?;
        Ok(())
    }
}
