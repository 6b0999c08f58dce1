//! Where the orchestrator's progress surfaces: a terminal or a session's
//! event channel.

use crate::event::ServerEvent;
use crate::message::ToolResult;

/// Receives orchestrator progress. Implementations must never block the
/// orchestrator loop for long; the server implementation is backed by an
/// unbounded channel.
pub trait UiSink: Send + Sync {
    fn text_delta(&self, text: &str);
    fn tool_call_started(&self, call_id: &str, tool_name: &str);
    fn tool_result(&self, call_id: &str, tool_name: &str, result: &ToolResult);
    fn provider_error(&self, message: &str);
    fn completed(&self, message: &str);
}

pub struct TerminalUiSink;

impl TerminalUiSink {
    pub fn new() -> Self {
        TerminalUiSink
    }
}

impl Default for TerminalUiSink {
    fn default() -> Self {
        Self::new()
    }
}

impl UiSink for TerminalUiSink {
    fn text_delta(&self, text: &str) {
        use std::io::Write;
        print!("{text}");
        std::io::stdout().flush().ok();
    }

    fn tool_call_started(&self, call_id: &str, tool_name: &str) {
        println!("\n[tool] {tool_name} call_id={call_id}");
    }

    fn tool_result(&self, _call_id: &str, tool_name: &str, result: &ToolResult) {
        if result.ok {
            println!("[tool] {tool_name} ok");
        } else {
            let message = result
                .diagnostics
                .first()
                .map(|d| d.message.clone())
                .unwrap_or_default();
            println!("[tool] {tool_name} failed: {message}");
        }
    }

    fn provider_error(&self, message: &str) {
        eprintln!("[Error] {message}");
    }

    fn completed(&self, message: &str) {
        println!("\n{message}");
    }
}

/// Mirrors orchestrator progress onto a session's unbounded event channel for
/// the SSE endpoint to relay.
pub struct ChannelUiSink {
    tx: tokio::sync::mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelUiSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }
}

impl UiSink for ChannelUiSink {
    fn text_delta(&self, text: &str) {
        let _ = self.tx.send(ServerEvent::TextDelta {
            text: text.to_string(),
        });
    }

    fn tool_call_started(&self, call_id: &str, tool_name: &str) {
        let _ = self.tx.send(ServerEvent::ToolCall {
            call_id: call_id.to_string(),
            tool: tool_name.to_string(),
            args_json: String::new(),
        });
    }

    fn tool_result(&self, call_id: &str, tool_name: &str, result: &ToolResult) {
        let _ = self.tx.send(ServerEvent::ToolResult {
            call_id: call_id.to_string(),
            tool: tool_name.to_string(),
            ok: result.ok,
            data: result.data.clone(),
        });
    }

    fn provider_error(&self, message: &str) {
        let _ = self.tx.send(ServerEvent::Error {
            message: message.to_string(),
        });
    }

    fn completed(&self, message: &str) {
        let _ = self.tx.send(ServerEvent::Completed {
            reason: message.to_string(),
        });
    }
}
