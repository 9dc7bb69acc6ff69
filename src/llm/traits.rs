//! Chat model abstraction
//!
//! Supervisors and subagents are written against this trait so that
//! pattern-level tests can script model behavior without a network.

use crate::error::AppError;
use crate::llm::types::{ChatMessage, ChatRequest};
use async_trait::async_trait;

/// A chat model that can complete conversations
///
/// Implementations must support plain completions, tool calling, and
/// JSON-schema constrained structured output, as selected by the request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation and return the assistant message
    async fn complete(&self, request: ChatRequest) -> Result<ChatMessage, AppError>;
}
