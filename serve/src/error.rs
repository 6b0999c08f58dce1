//! HTTP error mapping for the session endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServeError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServeError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServeError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServeError::NotImplemented(m) => (StatusCode::NOT_IMPLEMENTED, m.clone()),
            ServeError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<engine::AgentError> for ServeError {
    fn from(e: engine::AgentError) -> Self {
        ServeError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ServeError {
    fn from(e: std::io::Error) -> Self {
        ServeError::Internal(e.to_string())
    }
}
