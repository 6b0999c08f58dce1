//! Shared error taxonomy for the agent engine.
//!
//! Kinds map onto the propagation policy: `Validation` is fatal at startup,
//! everything under a tool call is caught and converted to a [`crate::ToolResult`]
//! rather than bubbling, and `Cancelled` surfaces as `[cancelled]` to the UI sink.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsafe path: {0}")]
    UnsafePath(String),

    #[error("tool execution denied by policy")]
    PolicyDenied,

    #[error("user denied approval")]
    ApprovalDenied,

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        AgentError::ToolExecution(msg.into())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
