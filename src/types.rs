//! Core data types used throughout fileagent.
//!
//! This module defines the provider-neutral conversation model: turns,
//! content blocks, tool invocations and tool descriptors, plus the tagged
//! response type every provider adapter produces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::AgentError;

// --- Roles ---

/// The role of a turn in the conversation.
///
/// - `User`: the human's input (and, for Anthropic-style history, tool results)
/// - `Assistant`: the model's reply or tool-call request
/// - `Tool`: the result of a tool execution, keyed by call id
/// - `System`: never accepted into history, the system prompt travels separately
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// --- Content ---

/// A typed piece of structured turn content.
///
/// The serde representation matches the Anthropic Messages API block format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Turn content: either a plain string or an ordered block sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    PlainText(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Concatenate all text carried by this content, ignoring tool blocks.
    pub fn text(&self) -> String {
        match self {
            Content::PlainText(text) => text.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

// --- Tool Invocation ---

/// A tool call requested by the model.
///
/// Created by an adapter's response parser and consumed exactly once by the
/// tool executor. `id` correlates the result turn back to this request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Fetch a string argument by name.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(|v| v.as_str())
    }
}

/// A non-empty, ordered batch of tool invocations from one assistant turn.
///
/// A response with zero tool calls is a text response, never an empty batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallBatch(Vec<ToolInvocation>);

impl ToolCallBatch {
    /// Returns `None` when `calls` is empty.
    pub fn new(calls: Vec<ToolInvocation>) -> Option<Self> {
        if calls.is_empty() {
            None
        } else {
            Some(Self(calls))
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ToolInvocation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[ToolInvocation] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ToolCallBatch {
    type Item = &'a ToolInvocation;
    type IntoIter = std::slice::Iter<'a, ToolInvocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// --- Turns ---

/// A single entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: Content,
    /// OpenAI-style tool calls attached to an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    /// OpenAI-style link from a tool turn back to its call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::PlainText(content.into()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::PlainText(content.into()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::PlainText(content.into()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    /// Assistant turn carrying calls in a side field (OpenAI shape).
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::PlainText(content.into()),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool result keyed by call id (OpenAI shape).
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Content::PlainText(content.into()),
            tool_calls: vec![],
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// A turn whose content is a block sequence (Anthropic shape).
    pub fn blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: Content::Blocks(blocks),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    /// Ids of the tool invocations this turn requests, in emission order.
    pub fn invocation_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.tool_calls.iter().map(|c| c.id.as_str()).collect();
        if let Content::Blocks(blocks) = &self.content {
            for block in blocks {
                if let ContentBlock::ToolUse { id, .. } = block {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Ids of the tool invocations this turn answers.
    pub fn answered_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if self.role == Role::Tool {
            if let Some(id) = &self.tool_call_id {
                ids.push(id.as_str());
            }
        }
        if let Content::Blocks(blocks) = &self.content {
            for block in blocks {
                if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                    ids.push(tool_use_id);
                }
            }
        }
        ids
    }
}

// --- Tool Descriptor ---

/// One string-typed tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Static description of a tool, registered once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDescriptor {
    /// Render the parameter list as a JSON Schema object.
    ///
    /// Both provider encodings embed this value unchanged (OpenAI as
    /// `parameters`, Anthropic as `input_schema`).
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": "string",
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// --- Provider Selection ---

/// The supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai_compatible" | "azure" | "azure_openai" | "ollama" => {
                Ok(ProviderKind::OpenAi)
            }
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(AgentError::Configuration(format!(
                "Unknown provider: '{}'. Supported: 'openai', 'anthropic'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

// --- Provider Request / Response ---

/// A provider-specific request body, ready to be POSTed by a model client.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub provider: ProviderKind,
    pub body: Value,
}

/// The outcome of one provider call.
///
/// Adapters build the tag; the agent loop only ever branches on it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// The model produced its final answer.
    Text(String),
    /// The model wants tools run. `preamble` is any prose emitted alongside.
    ToolCalls {
        preamble: Option<String>,
        calls: ToolCallBatch,
    },
}
