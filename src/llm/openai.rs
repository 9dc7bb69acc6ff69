//! OpenAI chat completions client
//!
//! Direct HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
//! Supports tool calling and JSON-schema constrained structured output, which
//! the router supervisor relies on.

use crate::error::AppError;
use crate::llm::traits::ChatModel;
use crate::llm::types::{ChatMessage, ChatRequest, Role, ToolCall};
use crate::llm::wire::{
    ApiFunction, ApiFunctionCall, ApiJsonSchema, ApiMessage, ApiRequest, ApiResponse,
    ApiResponseFormat, ApiTool, ApiToolCall,
};
use async_trait::async_trait;
use uuid::Uuid;

const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat model backed by an OpenAI-compatible HTTP API
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new client against the default OpenAI endpoint
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Override the base URL (compatible providers, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn to_wire_message(message: &ChatMessage) -> ApiMessage {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        ApiMessage {
            role: Self::role_name(message.role).to_string(),
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
            name: message.name.clone(),
        }
    }

    fn build_payload(&self, request: &ChatRequest) -> ApiRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|spec| ApiTool {
                        tool_type: "function".to_string(),
                        function: ApiFunction {
                            name: spec.name.clone(),
                            description: spec.description.clone(),
                            parameters: spec.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        let response_format = request.response_format.as_ref().map(|format| {
            ApiResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: ApiJsonSchema {
                    name: format.name.clone(),
                    schema: format.schema.clone(),
                    strict: true,
                },
            }
        });

        ApiRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(Self::to_wire_message).collect(),
            tools,
            response_format,
        }
    }

    fn parse_tool_calls(wire_calls: Vec<ApiToolCall>) -> Result<Vec<ToolCall>, AppError> {
        wire_calls
            .into_iter()
            .map(|call| {
                let arguments =
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        AppError::Llm(format!(
                            "Tool call '{}' has non-JSON arguments: {}",
                            call.function.name, e
                        ))
                    })?;
                Ok(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatMessage, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Llm("API key is empty".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(&request);

        tracing::debug!(
            url = %url,
            model = %self.model,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            structured = request.response_format.is_some(),
            "Calling chat completions API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send HTTP request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status_code,
                error_body = %error_body,
                "Chat completions API returned error status"
            );

            if status_code == 429 {
                return Err(AppError::LlmRateLimited(format!(
                    "HTTP {}: {}",
                    status_code, error_body
                )));
            }

            return Err(AppError::Llm(format!(
                "API returned error status {}: {}",
                status_code, error_body
            )));
        }

        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read response body: {}", e)))?;

        let parsed: ApiResponse = serde_json::from_str(&response_body).map_err(|e| {
            AppError::Llm(format!(
                "Failed to parse JSON response: {} - Response body: {}",
                e, response_body
            ))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("API response contains no choices".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = match choice.message.tool_calls {
            Some(wire_calls) => Self::parse_tool_calls(wire_calls)?,
            None => Vec::new(),
        };

        tracing::debug!(
            content_len = content.len(),
            tool_call_count = tool_calls.len(),
            finish_reason = ?choice.finish_reason,
            "Received chat completion"
        );

        Ok(ChatMessage {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{StructuredFormat, ToolSpec};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use serial_test::serial;

    fn request_with_user(content: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user(content)],
            tools: Vec::new(),
            response_format: None,
        }
    }

    #[tokio::test]
    async fn test_complete_empty_api_key() {
        let client = OpenAiClient::new("", "gpt-4o");
        let result = client.complete(request_with_user("hi")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key is empty"));
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_plain_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(
                r#"{
                    "choices": [{
                        "message": {"role": "assistant", "content": "Hello there"},
                        "finish_reason": "stop"
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let result = client.complete(request_with_user("hi")).await;

        mock.assert_async().await;
        let message = result.unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Hello there");
        assert!(message.tool_calls.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_parses_tool_calls() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "tools": [{"type": "function", "function": {"name": "search_tracks"}}]
            })))
            .with_status(200)
            .with_body(
                r#"{
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_abc",
                                "type": "function",
                                "function": {
                                    "name": "search_tracks",
                                    "arguments": "{\"query\": \"Back in Black\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let request = ChatRequest {
            messages: vec![ChatMessage::user("find back in black")],
            tools: vec![ToolSpec {
                name: "search_tracks".to_string(),
                description: "Search the catalog".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }),
            }],
            response_format: None,
        };
        let result = client.complete(request).await;

        mock.assert_async().await;
        let message = result.unwrap();
        assert_eq!(message.content, "");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].id, "call_abc");
        assert_eq!(message.tool_calls[0].name, "search_tracks");
        assert_eq!(
            message.tool_calls[0].arguments,
            json!({"query": "Back in Black"})
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_sends_structured_format() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "route_step", "strict": true}
                }
            })))
            .with_status(200)
            .with_body(
                r#"{
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": "{\"subagent\": \"end\", \"context\": \"\"}"
                        }
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let request = ChatRequest {
            messages: vec![ChatMessage::user("route this")],
            tools: Vec::new(),
            response_format: Some(StructuredFormat {
                name: "route_step".to_string(),
                schema: json!({"type": "object"}),
            }),
        };
        let result = client.complete(request).await;

        mock.assert_async().await;
        assert!(result.unwrap().content.contains("subagent"));
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_rate_limited() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": "Rate limit exceeded"}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let result = client.complete(request_with_user("hi")).await;

        mock.assert_async().await;
        match result {
            Err(AppError::LlmRateLimited(_)) => {}
            other => panic!("Expected LlmRateLimited, got: {:?}", other.map(|m| m.content)),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_empty_choices() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let result = client.complete(request_with_user("hi")).await;

        mock.assert_async().await;
        assert!(result.unwrap_err().to_string().contains("no choices"));
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_invalid_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("This is not JSON")
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let result = client.complete(request_with_user("hi")).await;

        mock.assert_async().await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse JSON"));
    }

    #[tokio::test]
    #[serial]
    async fn test_complete_malformed_tool_arguments() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                r#"{
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_abc",
                                "type": "function",
                                "function": {"name": "search_tracks", "arguments": "not json"}
                            }]
                        }
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", "gpt-4o").with_base_url(server.url());
        let result = client.complete(request_with_user("hi")).await;

        mock.assert_async().await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("non-JSON arguments"));
    }
}
