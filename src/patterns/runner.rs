//! Graph session driver
//!
//! Builds a fresh in-memory session per chat request and steps the graph
//! through graph-flow's `FlowRunner` until completion. The whole run is
//! wrapped in a wall-clock timeout so a misbehaving model cannot hang a
//! request indefinitely.

use crate::error::AppError;
use crate::llm::{ChatMessage, Role};
use crate::patterns::{CUSTOMER_ID_KEY, MESSAGES_KEY, REMAINING_STEPS_KEY};
use graph_flow::{
    ExecutionStatus, FlowRunner, Graph, InMemorySessionStorage, Session, SessionStorage,
};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

/// Input for one chat run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The user's message
    pub message: String,
    /// Customer id, when the user is signed in
    pub customer_id: Option<i64>,
    /// Supervisor turn budget for this run
    pub max_steps: i64,
}

/// Result of a completed chat run
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Final reply shown to the user
    pub reply: String,
    /// Full conversation transcript, including tool messages
    pub transcript: Vec<ChatMessage>,
    /// Node ids visited after the start node, in order
    pub steps: Vec<String>,
}

/// Outcome of driving the session one step forward
pub enum SessionStep {
    /// A task ran; `next_node` is the node scheduled next, when known
    Ran { next_node: Option<String> },
    /// The graph completed
    Done,
}

/// One in-flight graph session
pub struct GraphSession {
    runner: FlowRunner,
    storage: Arc<dyn SessionStorage>,
    session_id: String,
}

impl GraphSession {
    /// Create a session seeded with the user's message and shared state
    pub async fn begin(
        graph: Arc<Graph>,
        start_node: &str,
        request: &RunRequest,
    ) -> Result<Self, AppError> {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());
        let session_id = Uuid::new_v4().to_string();

        let session = Session::new_from_task(session_id.clone(), start_node);
        session
            .context
            .set(MESSAGES_KEY, vec![ChatMessage::user(&request.message)])
            .await;
        session
            .context
            .set(REMAINING_STEPS_KEY, request.max_steps)
            .await;
        if let Some(customer_id) = request.customer_id {
            session.context.set(CUSTOMER_ID_KEY, customer_id).await;
        }

        storage
            .save(session)
            .await
            .map_err(|e| AppError::SessionError(format!("Failed to save session: {}", e)))?;

        tracing::debug!(
            session_id = %session_id,
            start_node = %start_node,
            "Started graph session"
        );

        Ok(Self {
            runner,
            storage,
            session_id,
        })
    }

    /// Session id (one fresh uuid per request)
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Execute the next task of the session
    pub async fn step(&self) -> Result<SessionStep, AppError> {
        let execution_result = self
            .runner
            .run(&self.session_id)
            .await
            .map_err(convert_graph_error)?;

        tracing::debug!(
            session_id = %self.session_id,
            status = ?execution_result.status,
            "Graph execution status update"
        );

        match execution_result.status {
            ExecutionStatus::Completed => Ok(SessionStep::Done),
            ExecutionStatus::Paused { next_task_id, .. } => Ok(SessionStep::Ran {
                next_node: Some(next_task_id),
            }),
            ExecutionStatus::WaitingForInput => Ok(SessionStep::Ran { next_node: None }),
            ExecutionStatus::Error(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %err,
                    "Graph execution failed"
                );
                Err(AppError::TaskExecutionFailed(err.to_string()))
            }
        }
    }

    /// Read the final transcript and reply out of the session context
    pub async fn outcome(&self) -> Result<(String, Vec<ChatMessage>), AppError> {
        let session = self
            .storage
            .get(&self.session_id)
            .await
            .map_err(|e| AppError::SessionError(format!("Failed to get session: {}", e)))?
            .ok_or_else(|| {
                AppError::SessionError(format!(
                    "Session '{}' not found after execution",
                    self.session_id
                ))
            })?;

        let transcript: Vec<ChatMessage> = session
            .context
            .get(MESSAGES_KEY)
            .await
            .unwrap_or_default();

        let reply = transcript
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "The conversation ended without a reply.".to_string());

        Ok((reply, transcript))
    }
}

/// Run a pattern graph to completion and return the outcome
pub async fn run_graph(
    graph: Arc<Graph>,
    start_node: &str,
    request: RunRequest,
    run_timeout: Duration,
) -> Result<ChatOutcome, AppError> {
    timeout(run_timeout, run_graph_inner(graph, start_node, request))
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "Chat run timed out after {} seconds",
                run_timeout.as_secs()
            ))
        })?
}

async fn run_graph_inner(
    graph: Arc<Graph>,
    start_node: &str,
    request: RunRequest,
) -> Result<ChatOutcome, AppError> {
    let session = GraphSession::begin(graph, start_node, &request).await?;
    let mut steps = Vec::new();

    loop {
        match session.step().await? {
            SessionStep::Done => break,
            SessionStep::Ran { next_node } => {
                if let Some(node) = next_node {
                    steps.push(node);
                }
            }
        }
    }

    let (reply, transcript) = session.outcome().await?;

    tracing::debug!(
        session_id = %session.session_id(),
        step_count = steps.len(),
        transcript_len = transcript.len(),
        "Chat run completed"
    );

    Ok(ChatOutcome {
        reply,
        transcript,
        steps,
    })
}

/// Convert graph-flow error to AppError
fn convert_graph_error(e: graph_flow::GraphError) -> AppError {
    match e {
        graph_flow::GraphError::TaskExecutionFailed(msg) => AppError::TaskExecutionFailed(msg),
        graph_flow::GraphError::GraphNotFound(msg) => {
            AppError::GraphError(format!("Graph not found: {}", msg))
        }
        graph_flow::GraphError::InvalidEdge(msg) => {
            AppError::GraphError(format!("Invalid edge: {}", msg))
        }
        graph_flow::GraphError::TaskNotFound(msg) => {
            AppError::GraphError(format!("Task not found: {}", msg))
        }
        graph_flow::GraphError::ContextError(msg) => {
            AppError::GraphError(format!("Context error: {}", msg))
        }
        graph_flow::GraphError::StorageError(msg) => {
            AppError::SessionError(format!("Storage error: {}", msg))
        }
        graph_flow::GraphError::SessionNotFound(msg) => {
            AppError::SessionError(format!("Session not found: {}", msg))
        }
        graph_flow::GraphError::Other(err) => {
            AppError::Internal(anyhow::anyhow!("Graph execution error: {}", err))
        }
    }
}
