//! The turn loop: drives the model stream, dispatches tool calls under
//! policy, mutates the conversation, and terminates.

mod ui_sink;

pub use ui_sink::{ChannelUiSink, TerminalUiSink, UiSink};

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::message::{Message, ToolCall, ToolResult};
use crate::provider::{is_terminal_stop_reason, ModelRequest, NormalizedEvent, ProviderAdapter};
use crate::session::SessionLogWriter;
use crate::tool::{PolicyDecision, PolicyEngine, ToolContext, ToolRegistry};

/// Tunables for one orchestrator run.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub repo_root: std::path::PathBuf,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_iterations: usize,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        AgentOptions {
            repo_root: std::path::PathBuf::from("."),
            model: String::new(),
            system_prompt: None,
            max_iterations: 20,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

pub struct Orchestrator {
    options: AgentOptions,
    provider: Arc<dyn ProviderAdapter>,
    registry: Arc<ToolRegistry>,
    policy: PolicyEngine,
    tool_ctx: Arc<ToolContext>,
    log: Option<Arc<SessionLogWriter>>,
    ui: Arc<dyn UiSink>,
}

impl Orchestrator {
    pub fn new(
        options: AgentOptions,
        provider: Arc<dyn ProviderAdapter>,
        registry: Arc<ToolRegistry>,
        policy: PolicyEngine,
        tool_ctx: Arc<ToolContext>,
        log: Option<Arc<SessionLogWriter>>,
        ui: Arc<dyn UiSink>,
    ) -> Self {
        Self {
            options,
            provider,
            registry,
            policy,
            tool_ctx,
            log,
            ui,
        }
    }

    /// Drives the conversation: appends the user prompt, then loops the
    /// model-stream / tool-execution cycle until completion, exhaustion, or
    /// cancellation.
    pub async fn run(
        &self,
        user_prompt: &str,
        messages: &mut Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<(), AgentError> {
        messages.push(Message::User {
            content: user_prompt.to_string(),
        });
        if let Some(log) = &self.log {
            log.append_message(&messages[messages.len() - 1]);
            log.append_diagnostic("user_prompt", serde_json::json!({"content": user_prompt}));
        }

        for iteration in 0..self.options.max_iterations {
            if cancel.is_cancelled() {
                self.ui.completed("[cancelled]");
                return Ok(());
            }

            let request = ModelRequest {
                model: self.options.model.clone(),
                system_prompt: self.options.system_prompt.clone(),
                messages: messages.clone(),
                tools: self.registry.descriptors(),
                max_tokens: Some(self.options.max_tokens),
                temperature: self.options.temperature,
            };

            let mut stream = self.provider.stream(request, cancel.clone()).await;

            let mut text_buffer = String::new();
            let mut pending: Vec<ToolCall> = Vec::new();
            let mut completed = false;
            let mut provider_error: Option<String> = None;
            let mut stop_reason = String::new();

            while let Some(event) = stream.next().await {
                match event {
                    NormalizedEvent::TextDelta { text } => {
                        text_buffer.push_str(&text);
                        self.ui.text_delta(&text);
                    }
                    NormalizedEvent::ToolCallStarted { call_id, tool_name } => {
                        self.ui.tool_call_started(&call_id, &tool_name);
                    }
                    NormalizedEvent::ToolCallArgsDelta { .. } => {}
                    NormalizedEvent::ToolCallReady {
                        call_id,
                        tool_name,
                        args_json,
                    } => {
                        pending.push(ToolCall {
                            call_id,
                            name: tool_name,
                            args_json,
                        });
                    }
                    NormalizedEvent::Trace { kind, raw } => {
                        if kind == "error" {
                            provider_error = Some(raw.clone());
                            self.ui.provider_error(&raw);
                        }
                        if let Some(log) = &self.log {
                            log.append_diagnostic("event", serde_json::json!({"kind": kind, "raw": raw}));
                        }
                    }
                    NormalizedEvent::ResponseCompleted { stop_reason: reason, .. } => {
                        stop_reason = reason.clone();
                        completed = is_terminal_stop_reason(&reason);
                        break;
                    }
                }
            }

            if !text_buffer.is_empty() || !pending.is_empty() {
                let assistant_msg = Message::Assistant {
                    content: if text_buffer.is_empty() {
                        None
                    } else {
                        Some(text_buffer.clone())
                    },
                    tool_calls: pending.clone(),
                };
                messages.push(assistant_msg.clone());
                if let Some(log) = &self.log {
                    log.append_message(&assistant_msg);
                }
            }

            if pending.is_empty() && completed {
                self.ui.completed("[Agent completed]");
                return Ok(());
            }

            if pending.is_empty() && text_buffer.is_empty() && !completed {
                self.ui.completed(&format!(
                    "[No response] stop_reason={stop_reason} error={provider_error:?}"
                ));
                return Ok(());
            }

            if !pending.is_empty() {
                for call in &pending {
                    let result = self.execute_tool_call(call, &cancel).await;
                    let tool_msg = Message::Tool {
                        call_id: call.call_id.clone(),
                        tool_name: call.name.clone(),
                        result: result.clone(),
                    };
                    messages.push(tool_msg.clone());
                    self.ui.tool_result(&call.call_id, &call.name, &result);
                    if let Some(log) = &self.log {
                        log.append_message(&tool_msg);
                        log.append_diagnostic(
                            "tool_result",
                            serde_json::json!({
                                "callId": call.call_id,
                                "tool": call.name,
                                "ok": result.ok,
                                "diagnostics": result.diagnostics,
                            }),
                        );
                    }
                }
                continue;
            }

            // pending = ∅, text ≠ ∅, not completed: nothing more to do this turn.
            info!(iteration, "orchestrator exiting: model produced text but is not done and issued no tool calls");
            return Ok(());
        }

        self.ui.completed("[max iterations reached]");
        Ok(())
    }

    async fn execute_tool_call(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        let started = Instant::now();
        let tool = match self.registry.get(&call.name) {
            Some(t) => t,
            None => {
                return ToolResult::failure("UnknownTool", format!("Unknown tool: {}", call.name))
            }
        };

        let decision = self.policy.evaluate(tool, &call.args_json);
        match decision {
            PolicyDecision::Denied => {
                return ToolResult::failure("PolicyDenied", "Tool execution denied by policy")
            }
            PolicyDecision::RequiresApproval => {
                match self
                    .tool_ctx
                    .approvals
                    .request_approval(&call.name, &call.args_json, Some(&call.call_id), cancel)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => return ToolResult::failure("ApprovalDenied", "User denied approval"),
                    Err(_) => return ToolResult::failure("Cancelled", "[cancelled]"),
                }
            }
            PolicyDecision::Allowed => {}
        }

        let args: serde_json::Value = match serde_json::from_str(&call.args_json) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::failure(
                    "ToolExecutionError",
                    format!("Tool execution failed: {e}"),
                )
            }
        };

        let result = match tool.execute(args, &self.tool_ctx, cancel).await {
            Ok(r) => r,
            Err(e) => ToolResult::failure("ToolExecutionError", format!("Tool execution failed: {e}")),
        };

        if result.ok {
            tracing::debug!(tool = %call.name, call_id = %call.call_id, elapsed_ms = %started.elapsed().as_millis(), "tool executed");
        } else {
            warn!(tool = %call.name, call_id = %call.call_id, "tool returned failure");
        }

        result
    }
}
