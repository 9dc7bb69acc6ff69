//! Tool-calling react loop shared by the specialist subagents
//!
//! A subagent is a focused system prompt plus a set of database-backed tools.
//! The loop alternates model completions and tool execution until the model
//! answers without tool calls or the turn budget runs out.

use crate::error::AppError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolSpec};
use async_trait::async_trait;

/// Upper bound on completions per subagent run
pub const MAX_SUBAGENT_TURNS: usize = 6;

/// A set of tools a subagent can execute
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool specifications presented to the model
    fn specs(&self) -> Vec<ToolSpec>;

    /// Execute the named tool and return its textual result
    async fn call(&self, name: &str, arguments: &serde_json::Value)
        -> Result<String, AppError>;
}

/// Run a tool-calling loop to completion and return the final answer text
pub async fn run_react(
    model: &dyn ChatModel,
    system_prompt: &str,
    conversation: Vec<ChatMessage>,
    tools: &dyn ToolHandler,
) -> Result<String, AppError> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(conversation);

    let specs = tools.specs();
    let mut last_content = String::new();

    for turn in 0..MAX_SUBAGENT_TURNS {
        let response = model
            .complete(ChatRequest {
                messages: messages.clone(),
                tools: specs.clone(),
                response_format: None,
            })
            .await?;

        let tool_calls = response.tool_calls.clone();
        last_content = response.content.clone();
        messages.push(response);

        if tool_calls.is_empty() {
            return Ok(last_content);
        }

        tracing::debug!(
            turn = turn,
            tool_call_count = tool_calls.len(),
            "Subagent requested tools"
        );

        for call in tool_calls {
            let output = tools.call(&call.name, &call.arguments).await?;
            messages.push(ChatMessage::tool(output, call.id, call.name));
        }
    }

    tracing::warn!("Subagent hit its turn budget without a final answer");
    if last_content.is_empty() {
        Ok("I wasn't able to complete this request within the allotted steps.".to_string())
    } else {
        Ok(last_content)
    }
}
