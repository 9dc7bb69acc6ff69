//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// All errors that can occur in the application are represented by this enum.
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested orchestration pattern does not exist
    #[error("Unknown orchestration pattern: {0}")]
    UnknownPattern(String),

    /// Request body failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Chat model call failed
    #[error("Chat model error: {0}")]
    Llm(String),

    /// Chat model rejected the request due to rate limiting
    #[error("Chat model rate limited: {0}")]
    LlmRateLimited(String),

    /// Graph-flow session error
    #[error("Session error: {0}")]
    SessionError(String),

    /// Graph-flow graph construction or execution error
    #[error("Graph error: {0}")]
    GraphError(String),

    /// Individual task execution failed
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::UnknownPattern(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Llm(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::LlmRateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::SessionError(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::GraphError(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::TaskExecutionFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
