//! Wire types for the OpenAI chat completions API
//!
//! Request and response payloads for `POST /chat/completions`. Tool call
//! arguments travel as a JSON-encoded string on the wire; conversion to and
//! from our structured [`ToolCall`](crate::llm::types::ToolCall) happens in
//! the client.

use serde::{Deserialize, Serialize};

/// Top-level chat completions request
#[derive(Debug, Serialize)]
pub struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ApiResponseFormat>,
}

/// A message as sent to the API
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Function-style tool declaration
#[derive(Debug, Serialize)]
pub struct ApiTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ApiFunction,
}

/// Function payload of a tool declaration
#[derive(Debug, Serialize)]
pub struct ApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// `response_format` for JSON-schema constrained output
#[derive(Debug, Serialize)]
pub struct ApiResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: ApiJsonSchema,
}

/// Named schema inside `response_format`
#[derive(Debug, Serialize)]
pub struct ApiJsonSchema {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

/// A tool call on the wire (request and response sides share this shape)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ApiFunctionCall,
}

/// Function payload of a tool call; `arguments` is a JSON-encoded string
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Top-level chat completions response
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
}

/// A single completion choice
#[derive(Debug, Deserialize)]
pub struct ApiChoice {
    pub message: ApiResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a completion choice
#[derive(Debug, Deserialize)]
pub struct ApiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiToolCall>>,
}
