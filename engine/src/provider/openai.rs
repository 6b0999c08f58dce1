//! OpenAI (and OpenAI-compatible) adapter, built on `async-openai`'s native
//! streaming client with per-index tool-call-argument fragment reassembly.

use std::collections::HashMap;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionToolType, ChatCompletionTools,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ModelRequest, NormalizedEvent, ProviderAdapter, Usage};
use crate::message::Message;

pub struct OpenAiAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
        }
    }

    fn build_messages(request: &ModelRequest) -> Vec<ChatCompletionRequestMessage> {
        let mut out = Vec::new();
        if let Some(system) = &request.system_prompt {
            out.push(ChatCompletionRequestMessage::System(
                async_openai::types::chat::ChatCompletionRequestSystemMessage {
                    content: async_openai::types::chat::ChatCompletionRequestSystemMessageContent::Text(
                        system.clone(),
                    ),
                    name: None,
                },
            ));
        }

        for msg in &request.messages {
            match msg {
                Message::User { content } => {
                    out.push(ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessage {
                            content: ChatCompletionRequestUserMessageContent::Text(content.clone()),
                            name: None,
                        },
                    ));
                }
                Message::Assistant { content, tool_calls } => {
                    let content_part = content.clone().map(|c| {
                        ChatCompletionRequestAssistantMessageContent::Text(c)
                    });
                    let tool_calls_out = if tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            tool_calls
                                .iter()
                                .map(|tc| {
                                    async_openai::types::chat::ChatCompletionMessageToolCall {
                                        id: tc.call_id.clone(),
                                        r#type: Some(ChatCompletionToolType::Function),
                                        function: FunctionCall {
                                            name: tc.name.clone(),
                                            arguments: tc.args_json.clone(),
                                        },
                                    }
                                })
                                .collect(),
                        )
                    };
                    out.push(ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessage {
                            content: content_part,
                            tool_calls: tool_calls_out,
                            ..Default::default()
                        },
                    ));
                }
                Message::Tool { call_id, result, .. } => {
                    let text = if result.ok {
                        result
                            .data
                            .as_ref()
                            .map(|d| d.to_string())
                            .or_else(|| result.stdout.clone())
                            .unwrap_or_else(|| "OK".to_string())
                    } else {
                        result
                            .stderr
                            .clone()
                            .or_else(|| result.diagnostics.first().map(|d| d.message.clone()))
                            .unwrap_or_else(|| "tool failed".to_string())
                    };
                    out.push(ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessage {
                            tool_call_id: call_id.clone(),
                            content: ChatCompletionRequestToolMessageContent::Text(text),
                        },
                    ));
                }
            }
        }
        out
    }

    fn build_tools(request: &ModelRequest) -> Vec<ChatCompletionTools> {
        request
            .tools
            .iter()
            .map(|t| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(sanitize_schema(&t.input_schema)),
                        strict: None,
                    },
                })
            })
            .collect()
    }
}

fn sanitize_schema(schema: &serde_json::Value) -> serde_json::Value {
    if schema.is_object() {
        schema.clone()
    } else {
        serde_json::json!({})
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn stream(
        &self,
        request: ModelRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, NormalizedEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();

        tokio::spawn(async move {
            let messages = Self::build_messages(&request);
            let tools = Self::build_tools(&request);

            let mut args = CreateChatCompletionRequestArgs::default();
            args.model(request.model.clone());
            args.messages(messages);
            args.stream(true);
            if !tools.is_empty() {
                args.tools(tools);
            }
            if let Some(max_tokens) = request.max_tokens {
                args.max_tokens(max_tokens);
            }
            if let Some(temp) = request.temperature {
                args.temperature(temp);
            }

            let built = match args.build() {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(NormalizedEvent::Trace {
                        kind: "error".to_string(),
                        raw: e.to_string(),
                    });
                    let _ = tx.send(NormalizedEvent::ResponseCompleted {
                        stop_reason: "error".to_string(),
                        usage: None,
                    });
                    return;
                }
            };

            debug!(model = %request.model, "starting OpenAI stream");

            let mut stream = match client.chat().create_stream(built).await {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(NormalizedEvent::Trace {
                        kind: "error".to_string(),
                        raw: e.to_string(),
                    });
                    let _ = tx.send(NormalizedEvent::ResponseCompleted {
                        stop_reason: "error".to_string(),
                        usage: None,
                    });
                    return;
                }
            };

            // index -> (call_id, tool_name, args_buffer, started)
            let mut pending: HashMap<u32, (String, String, String, bool)> = HashMap::new();
            let mut usage: Option<Usage> = None;
            let mut stop_reason = "stop".to_string();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(NormalizedEvent::Trace {
                            kind: "error".to_string(),
                            raw: "cancelled".to_string(),
                        });
                        let _ = tx.send(NormalizedEvent::ResponseCompleted {
                            stop_reason: "error".to_string(),
                            usage: None,
                        });
                        return;
                    }
                    next = stream.next() => {
                        let Some(chunk) = next else { break };
                        let chunk = match chunk {
                            Ok(c) => c,
                            Err(e) => {
                                let _ = tx.send(NormalizedEvent::Trace {
                                    kind: "parse_error".to_string(),
                                    raw: e.to_string(),
                                });
                                continue;
                            }
                        };

                        if let Some(u) = chunk.usage {
                            usage = Some(Usage {
                                prompt_tokens: u.prompt_tokens,
                                completion_tokens: u.completion_tokens,
                                total_tokens: u.total_tokens,
                            });
                        }

                        for choice in &chunk.choices {
                            if let Some(reason) = &choice.finish_reason {
                                stop_reason = normalize_finish_reason(&format!("{reason:?}"));
                            }

                            let delta = &choice.delta;
                            if let Some(content) = &delta.content {
                                if !content.is_empty() {
                                    let _ = tx.send(NormalizedEvent::TextDelta {
                                        text: content.clone(),
                                    });
                                }
                            }

                            if let Some(tool_calls) = &delta.tool_calls {
                                for tc in tool_calls {
                                    let entry = pending.entry(tc.index).or_insert_with(|| {
                                        (String::new(), String::new(), String::new(), false)
                                    });
                                    if let Some(id) = &tc.id {
                                        if !id.is_empty() {
                                            entry.0 = id.clone();
                                        }
                                    }
                                    if let Some(func) = &tc.function {
                                        if let Some(name) = &func.name {
                                            entry.1.push_str(name);
                                        }
                                        if !entry.3 && !entry.1.is_empty() {
                                            entry.3 = true;
                                            let _ = tx.send(NormalizedEvent::ToolCallStarted {
                                                call_id: entry.0.clone(),
                                                tool_name: entry.1.clone(),
                                            });
                                        }
                                        if let Some(fragment) = &func.arguments {
                                            entry.2.push_str(fragment);
                                            let _ = tx.send(NormalizedEvent::ToolCallArgsDelta {
                                                call_id: entry.0.clone(),
                                                fragment: fragment.clone(),
                                            });
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }

            for (_, (call_id, tool_name, args_buf, _)) in pending {
                let args_json = if args_buf.trim().is_empty() {
                    "{}".to_string()
                } else {
                    args_buf
                };
                let _ = tx.send(NormalizedEvent::ToolCallReady {
                    call_id,
                    tool_name,
                    args_json,
                });
            }

            let _ = tx.send(NormalizedEvent::ResponseCompleted {
                stop_reason,
                usage,
            });
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

fn normalize_finish_reason(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("stop") {
        "end_turn".to_string()
    } else {
        lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, ToolCall};

    #[test]
    fn assistant_with_tool_calls_translates_to_tool_call_entries() {
        let request = ModelRequest {
            model: "gpt-4o".to_string(),
            system_prompt: None,
            messages: vec![Message::Assistant {
                content: Some("thinking".to_string()),
                tool_calls: vec![ToolCall {
                    call_id: "c1".to_string(),
                    name: "ReadFile".to_string(),
                    args_json: "{}".to_string(),
                }],
            }],
            tools: vec![],
            max_tokens: None,
            temperature: None,
        };
        let messages = OpenAiAdapter::build_messages(&request);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn terminal_stop_reason_maps_to_end_turn() {
        assert_eq!(normalize_finish_reason("Stop"), "end_turn");
        assert_eq!(normalize_finish_reason("ToolCalls"), "toolcalls");
    }
}
