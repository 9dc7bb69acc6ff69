//! Chat API handlers
//!
//! One endpoint per orchestration pattern, each in a buffered and a
//! streaming (SSE) flavor. The streaming variant emits one status event per
//! graph node visited, then the final reply, then a `[DONE]` sentinel.

use crate::error::AppError;
use crate::llm::ChatMessage;
use crate::patterns::runner::{GraphSession, RunRequest, SessionStep};
use crate::patterns::SUPERVISOR_NODE;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures_util::StreamExt;
use graph_flow::Graph;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Duration;

const MAX_MESSAGE_LENGTH: usize = 10_000; // 10KB

/// The three orchestration patterns exposed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    SubagentsAsTools,
    HandoffTools,
    CommandSend,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::SubagentsAsTools => "subagents-as-tools",
            PatternKind::HandoffTools => "handoff-tools",
            PatternKind::CommandSend => "command-send",
        }
    }

    fn graph(&self, state: &AppState) -> Arc<Graph> {
        match self {
            PatternKind::SubagentsAsTools => state.subagents_graph.clone(),
            PatternKind::HandoffTools => state.handoff_graph.clone(),
            PatternKind::CommandSend => state.router_graph.clone(),
        }
    }
}

impl FromStr for PatternKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subagents-as-tools" => Ok(PatternKind::SubagentsAsTools),
            "handoff-tools" => Ok(PatternKind::HandoffTools),
            "command-send" => Ok(PatternKind::CommandSend),
            other => Err(AppError::UnknownPattern(other.to_string())),
        }
    }
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    /// The customer's message
    pub message: String,
    /// Customer id, when the customer is signed in
    pub customer_id: Option<i64>,
}

/// Buffered chat response
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    /// Pattern that served the request
    pub pattern: &'static str,
    /// Final reply for the customer
    pub reply: String,
    /// Full transcript, including tool and subagent messages
    pub transcript: Vec<ChatMessage>,
    /// Graph nodes visited after the start node
    pub steps: Vec<String>,
}

fn validate(body: &ChatRequestBody) -> Result<(), AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::InvalidRequest("Message is empty".to_string()));
    }
    if body.message.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::InvalidRequest(format!(
            "Message too long ({} > {} characters)",
            body.message.len(),
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(())
}

async fn check_customer(state: &AppState, body: &ChatRequestBody) -> Result<(), AppError> {
    if let Some(customer_id) = body.customer_id {
        if !state.db.customer_exists(customer_id).await? {
            return Err(AppError::InvalidRequest(format!(
                "Unknown customer id: {}",
                customer_id
            )));
        }
    }
    Ok(())
}

fn run_request(state: &AppState, body: &ChatRequestBody) -> RunRequest {
    RunRequest {
        message: body.message.clone(),
        customer_id: body.customer_id,
        max_steps: state.config.execution.max_agent_turns,
    }
}

/// POST /api/chat/:pattern - run one chat turn and return the full outcome
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(pattern): Path<String>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, AppError> {
    let kind = PatternKind::from_str(&pattern)?;
    validate(&body)?;
    check_customer(&state, &body).await?;

    tracing::info!(
        pattern = kind.as_str(),
        customer_id = ?body.customer_id,
        message_len = body.message.len(),
        "Chat request received"
    );

    let outcome = crate::patterns::runner::run_graph(
        kind.graph(&state),
        SUPERVISOR_NODE,
        run_request(&state, &body),
        Duration::from_secs(state.config.execution.run_timeout_secs),
    )
    .await?;

    Ok(Json(ChatResponseBody {
        pattern: kind.as_str(),
        reply: outcome.reply,
        transcript: outcome.transcript,
        steps: outcome.steps,
    }))
}

/// Helper to format a stream of events into SSE ("data: <event>\n\n") frames
fn format_sse_stream(
    stream: impl futures_util::Stream<Item = Result<String, axum::Error>> + Send + 'static,
) -> impl futures_util::Stream<Item = Result<String, std::io::Error>> {
    stream.map(|event_result| {
        let sse_text = match event_result {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => format!("data: [ERROR] {}\n\n", e),
        };
        Ok::<_, std::io::Error>(sse_text)
    })
}

/// POST /api/chat/:pattern/stream - run one chat turn, streaming node-by-node
/// progress as SSE
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Path(pattern): Path<String>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Response, AppError> {
    let kind = PatternKind::from_str(&pattern)?;
    validate(&body)?;
    check_customer(&state, &body).await?;

    let graph = kind.graph(&state);
    let request = run_request(&state, &body);
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(state.config.execution.run_timeout_secs);

    use async_stream::stream;

    let stream = stream! {
        yield Ok::<String, axum::Error>(
            json!({"type": "started", "pattern": kind.as_str()}).to_string(),
        );

        let session = match GraphSession::begin(graph, SUPERVISOR_NODE, &request).await {
            Ok(session) => session,
            Err(e) => {
                yield Ok(json!({"type": "error", "error": e.to_string()}).to_string());
                yield Ok("[DONE]".to_string());
                return;
            }
        };

        loop {
            let step = match tokio::time::timeout_at(deadline, session.step()).await {
                Ok(step) => step,
                Err(_) => {
                    yield Ok(json!({"type": "error", "error": "Chat run timed out"}).to_string());
                    yield Ok("[DONE]".to_string());
                    return;
                }
            };

            match step {
                Ok(SessionStep::Done) => break,
                Ok(SessionStep::Ran { next_node }) => {
                    if let Some(node) = next_node {
                        yield Ok(json!({"type": "node", "node": node}).to_string());
                    }
                }
                Err(e) => {
                    yield Ok(json!({"type": "error", "error": e.to_string()}).to_string());
                    yield Ok("[DONE]".to_string());
                    return;
                }
            }
        }

        match session.outcome().await {
            Ok((reply, _transcript)) => {
                yield Ok(json!({"type": "reply", "reply": reply}).to_string());
            }
            Err(e) => {
                yield Ok(json!({"type": "error", "error": e.to_string()}).to_string());
            }
        }
        yield Ok("[DONE]".to_string());
    };

    let sse_stream = format_sse_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(
            PatternKind::from_str("subagents-as-tools").unwrap(),
            PatternKind::SubagentsAsTools
        );
        assert_eq!(
            PatternKind::from_str("handoff-tools").unwrap(),
            PatternKind::HandoffTools
        );
        assert_eq!(
            PatternKind::from_str("command-send").unwrap(),
            PatternKind::CommandSend
        );

        let err = PatternKind::from_str("round-robin").unwrap_err();
        assert!(matches!(err, AppError::UnknownPattern(_)));
    }

    #[test]
    fn test_pattern_round_trips_through_as_str() {
        for kind in [
            PatternKind::SubagentsAsTools,
            PatternKind::HandoffTools,
            PatternKind::CommandSend,
        ] {
            assert_eq!(PatternKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_validate_rejects_bad_messages() {
        let empty = ChatRequestBody {
            message: "   ".to_string(),
            customer_id: None,
        };
        assert!(matches!(
            validate(&empty),
            Err(AppError::InvalidRequest(_))
        ));

        let oversized = ChatRequestBody {
            message: "x".repeat(MAX_MESSAGE_LENGTH + 1),
            customer_id: None,
        };
        assert!(matches!(
            validate(&oversized),
            Err(AppError::InvalidRequest(_))
        ));

        let ok = ChatRequestBody {
            message: "Which AC/DC albums do you have?".to_string(),
            customer_id: Some(1),
        };
        assert!(validate(&ok).is_ok());
    }

    #[tokio::test]
    async fn test_sse_formatting() {
        let events = futures_util::stream::iter(vec![
            Ok::<String, axum::Error>("{\"type\":\"started\"}".to_string()),
            Ok("[DONE]".to_string()),
        ]);

        let frames: Vec<_> = format_sse_stream(events).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0].as_ref().unwrap(),
            "data: {\"type\":\"started\"}\n\n"
        );
        assert_eq!(frames[1].as_ref().unwrap(), "data: [DONE]\n\n");
    }
}
