//! Server event model: the variants mirrored to a session's subscriber stream.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    TextDelta {
        text: String,
    },
    ToolCall {
        #[serde(rename = "callId")]
        call_id: String,
        tool: String,
        #[serde(rename = "argsJson")]
        args_json: String,
    },
    ApprovalRequired {
        #[serde(rename = "callId")]
        call_id: String,
        tool: String,
        #[serde(rename = "argsJson")]
        args_json: String,
        reason: String,
    },
    ToolResult {
        #[serde(rename = "callId")]
        call_id: String,
        tool: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Completed {
        reason: String,
    },
    Trace {
        kind: String,
        raw: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// The SSE `event:` line name for this variant.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::TextDelta { .. } => "text_delta",
            ServerEvent::ToolCall { .. } => "tool_call",
            ServerEvent::ApprovalRequired { .. } => "approval_required",
            ServerEvent::ToolResult { .. } => "tool_result",
            ServerEvent::Completed { .. } => "completed",
            ServerEvent::Trace { .. } => "trace",
            ServerEvent::Error { .. } => "error",
        }
    }
}
