//! Conversation types shared by the supervisor and subagents
//!
//! Messages carry a stable id so that state updates can merge additively:
//! a batch of new messages is appended to a transcript, except where an id
//! already exists, in which case the existing message is replaced in place.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// End-user message
    User,
    /// Model response
    Assistant,
    /// Result of a tool invocation
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id; tool messages answer it
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable message id, used by `append_messages` for replace-by-id merging
    pub id: String,
    /// Role of the sender
    pub role: Role,
    /// Text content (may be empty for pure tool-call turns)
    pub content: String,
    /// Tool invocations requested by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages: the call id this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For tool messages: the name of the tool that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool invocations
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let mut message = Self::new(Role::Assistant, content);
        message.tool_calls = tool_calls;
        message
    }

    /// Create a tool message answering the given tool call
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message.name = Some(name.into());
        message
    }
}

/// Specification of a tool the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name as presented to the model
    pub name: String,
    /// Human-readable description of when to use the tool
    pub description: String,
    /// JSON schema of the tool arguments
    pub parameters: serde_json::Value,
}

/// JSON-schema constrained output format for structured completions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredFormat {
    /// Schema name (reported to the provider)
    pub name: String,
    /// The JSON schema the response content must satisfy
    pub schema: serde_json::Value,
}

/// A completion request against a chat model
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Conversation so far, system message first
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call (empty = plain completion)
    pub tools: Vec<ToolSpec>,
    /// When set, the response content must be JSON matching this schema
    pub response_format: Option<StructuredFormat>,
}

/// Merge a batch of new messages into an existing transcript
///
/// Messages whose id already exists replace the existing entry in place;
/// all other messages are appended in order.
pub fn append_messages(transcript: &mut Vec<ChatMessage>, new_messages: Vec<ChatMessage>) {
    for message in new_messages {
        if let Some(existing) = transcript.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            transcript.push(message);
        }
    }
}
