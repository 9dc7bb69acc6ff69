//! Test doubles for the chat model
//!
//! Pattern-level tests drive whole graphs with fake models so no network is
//! involved. `ScriptedModel` replays a fixed response sequence; `RoutedModel`
//! picks its response from the request contents, which keeps tests
//! deterministic when subagents run in parallel.

use crate::error::AppError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays a fixed sequence of responses, recording every request
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ChatMessage>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ChatMessage>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The nth request the model received
    pub fn request(&self, index: usize) -> ChatRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatMessage, AppError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Llm("Scripted model ran out of responses".to_string()))
    }
}

/// Chooses a response based on the request, recording every request
///
/// Use this when completion order is nondeterministic (parallel subagents).
pub struct RoutedModel {
    #[allow(clippy::type_complexity)]
    route: Box<dyn Fn(&ChatRequest) -> Result<ChatMessage, AppError> + Send + Sync>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl RoutedModel {
    pub fn new(
        route: impl Fn(&ChatRequest) -> Result<ChatMessage, AppError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            route: Box::new(route),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RoutedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatMessage, AppError> {
        let response = (self.route)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// The system prompt of a request, or empty when there is none
pub fn system_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .first()
        .filter(|m| m.role == crate::llm::Role::System)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}
