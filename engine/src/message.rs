//! Conversation data model: messages, tool calls, and tool results.
//!
//! Messages are immutable once created; the orchestrator only ever appends.

use serde::{Deserialize, Serialize};

/// One entry in the conversation, in one of three shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        result: ToolResult,
    },
}

/// A single request from the assistant to invoke a tool.
///
/// `args_json` holds the complete argument object once the value exists;
/// partial argument fragments live only inside provider adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub name: String,
    #[serde(rename = "argsJson")]
    pub args_json: String,
}

/// The outcome of executing a [`ToolCall`].
///
/// `ok = false` implies at least one diagnostic is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ToolResult {
    pub fn success(data: serde_json::Value) -> Self {
        ToolResult {
            ok: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        ToolResult {
            ok: false,
            diagnostics: vec![Diagnostic {
                code: code.into(),
                message: message.into(),
                details: None,
            }],
            ..Default::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_failure_has_diagnostic() {
        let r = ToolResult::failure("Unsafe", "path escapes root");
        assert!(!r.ok);
        assert_eq!(r.diagnostics.len(), 1);
        assert_eq!(r.diagnostics[0].code, "Unsafe");
    }

    #[test]
    fn message_round_trips_through_json() {
        let msg = Message::Assistant {
            content: Some("hi".into()),
            tool_calls: vec![ToolCall {
                call_id: "c1".into(),
                name: "ReadFile".into(),
                args_json: "{}".into(),
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
