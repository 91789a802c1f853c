//! OpenAI-style (chat completions) adapter.
//!
//! - the system prompt is the first message, with role "system"
//! - tools are wrapped as `{"type": "function", "function": {...}}`
//! - tool calls live in a `tool_calls` field on the assistant message and
//!   their arguments are a JSON-encoded string
//! - each tool result is its own message with role "tool" and a
//!   `tool_call_id` pointing back at the call

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

const NAME: &str = "OpenAI";

pub struct OpenAiAdapter {
    model: String,
    max_tokens: u32,
}

// --- API Request Types (OpenAI format) ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool(tool_call_id: String, content: String) -> Self {
        Self {
            role: "tool",
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }
}

#[derive(Serialize)]
struct ApiTool {
    r#type: &'static str,
    function: ApiFunction,
}

#[derive(Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct ApiToolCall {
    id: String,
    r#type: &'static str,
    function: ApiToolCallFunction,
}

#[derive(Serialize)]
struct ApiToolCallFunction {
    name: String,
    arguments: String,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize, Debug)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiResponseFunction,
}

#[derive(Deserialize, Debug)]
struct ApiResponseFunction {
    name: String,
    /// Normally a JSON string; some compatible servers send an object.
    #[serde(default)]
    arguments: Value,
}

// --- Implementation ---

impl OpenAiAdapter {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
        }
    }

    fn convert_turn(&self, turn: &Turn, out: &mut Vec<ApiMessage>) -> Result<(), AgentError> {
        match turn.role {
            Role::System => return Err(HistoryError::SystemTurn.into()),
            Role::User => match &turn.content {
                Content::PlainText(text) => out.push(ApiMessage::text("user", text.clone())),
                Content::Blocks(blocks) => {
                    // Tool results carried as blocks become individual tool messages.
                    let mut text = String::new();
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text: t } => text.push_str(t),
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                            } => out.push(ApiMessage::tool(tool_use_id.clone(), content.clone())),
                            ContentBlock::ToolUse { .. } => {
                                return Err(AgentError::protocol(
                                    NAME,
                                    "tool_use block found in a user turn",
                                ))
                            }
                        }
                    }
                    if !text.is_empty() {
                        out.push(ApiMessage::text("user", text));
                    }
                }
            },
            Role::Assistant => {
                let text = turn.content.text();
                let mut calls: Vec<ApiToolCall> = turn
                    .tool_calls
                    .iter()
                    .map(|c| encode_call(&c.id, &c.name, Value::Object(c.arguments.clone())))
                    .collect();
                if let Content::Blocks(blocks) = &turn.content {
                    for block in blocks {
                        if let ContentBlock::ToolUse { id, name, input } = block {
                            calls.push(encode_call(id, name, input.clone()));
                        }
                    }
                }

                if calls.is_empty() {
                    out.push(ApiMessage::text("assistant", text));
                } else {
                    out.push(ApiMessage {
                        role: "assistant",
                        content: if text.is_empty() { None } else { Some(text) },
                        tool_calls: Some(calls),
                        tool_call_id: None,
                    });
                }
            }
            Role::Tool => {
                let id = turn.tool_call_id.clone().ok_or_else(|| {
                    AgentError::protocol(NAME, "tool turn without a tool_call_id")
                })?;
                out.push(ApiMessage::tool(id, turn.content.text()));
            }
        }
        Ok(())
    }
}

fn encode_call(id: &str, name: &str, input: Value) -> ApiToolCall {
    ApiToolCall {
        id: id.to_string(),
        r#type: "function",
        function: ApiToolCallFunction {
            name: name.to_string(),
            arguments: input.to_string(),
        },
    }
}

fn decode_arguments(tool: &str, raw: Value) -> Result<Map<String, Value>, AgentError> {
    let value = match raw {
        Value::Null => return Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => return Ok(Map::new()),
        Value::String(s) => serde_json::from_str::<Value>(&s).map_err(|e| {
            AgentError::protocol(
                NAME,
                format!("invalid JSON arguments for tool '{}': {}", tool, e),
            )
        })?,
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::protocol(
            NAME,
            format!("arguments for tool '{}' are not an object: {}", tool, other),
        )),
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.trim().is_empty() {
            messages.push(ApiMessage::text("system", system_prompt.to_string()));
        }
        for turn in history.turns() {
            self.convert_turn(turn, &mut messages)?;
        }

        let tools = tools
            .iter()
            .map(|t| ApiTool {
                r#type: "function",
                function: ApiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema(),
                },
            })
            .collect();

        let request = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            tools,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AgentError::protocol(NAME, format!("failed to encode request: {}", e)))?;

        Ok(ProviderRequest {
            provider: ProviderKind::OpenAi,
            body,
        })
    }

    fn translate_inbound(&self, response: Value) -> Result<ProviderResponse, AgentError> {
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(AgentError::protocol(NAME, format!("API error: {}", message)));
        }

        let api_response: ApiResponse = serde_json::from_value(response)
            .map_err(|e| AgentError::protocol(NAME, format!("unexpected response shape: {}", e)))?;
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::protocol(NAME, "no choices returned"))?;
        debug!(finish_reason = ?choice.finish_reason, "OpenAI response received");

        let content = choice.message.content.unwrap_or_default();
        let mut calls = Vec::new();
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let arguments = decode_arguments(&tc.function.name, tc.function.arguments)?;
            let id = tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            calls.push(ToolInvocation::new(id, tc.function.name, arguments));
        }

        Ok(match ToolCallBatch::new(calls) {
            Some(calls) => ProviderResponse::ToolCalls {
                preamble: Some(content).filter(|c| !c.trim().is_empty()),
                calls,
            },
            None => ProviderResponse::Text(content),
        })
    }

    fn append_assistant_tool_call_turn(
        &self,
        history: &mut ConversationHistory,
        preamble: Option<&str>,
        calls: &ToolCallBatch,
    ) -> Result<(), AgentError> {
        history.push(Turn::assistant_with_tool_calls(
            preamble.unwrap_or_default(),
            calls.as_slice().to_vec(),
        ))?;
        Ok(())
    }

    fn append_tool_result_turn(
        &self,
        history: &mut ConversationHistory,
        invocation: &ToolInvocation,
        result_text: &str,
    ) -> Result<(), AgentError> {
        history.push(Turn::tool_result(&invocation.id, result_text))?;
        Ok(())
    }
}
