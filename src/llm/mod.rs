//! Chat model layer
//!
//! Conversation types, the [`ChatModel`] abstraction, and the OpenAI-backed
//! implementation used in production.

pub mod openai;
pub mod traits;
pub mod types;
mod wire;

pub use openai::OpenAiClient;
pub use traits::ChatModel;
pub use types::{
    append_messages, ChatMessage, ChatRequest, Role, StructuredFormat, ToolCall, ToolSpec,
};
