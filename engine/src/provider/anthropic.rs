//! Anthropic Messages API adapter: no ready-made streaming client exists for
//! this vendor in this stack, so this hand-rolls the HTTP POST and
//! `text/event-stream` frame parsing the adapter contract requires.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::StreamExt as _;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ModelRequest, NormalizedEvent, ProviderAdapter, Usage};
use crate::message::Message;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .expect("reqwest client"),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    fn build_body(request: &ModelRequest) -> Value {
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg {
                Message::User { content } => {
                    messages.push(json!({"role": "user", "content": content}));
                }
                Message::Assistant { content, tool_calls } => {
                    let mut blocks = Vec::new();
                    if let Some(text) = content {
                        if !text.is_empty() {
                            blocks.push(json!({"type": "text", "text": text}));
                        }
                    }
                    for tc in tool_calls {
                        let input: Value =
                            serde_json::from_str(&tc.args_json).unwrap_or_else(|_| json!({}));
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.call_id,
                            "name": tc.name,
                            "input": input,
                        }));
                    }
                    messages.push(json!({"role": "assistant", "content": blocks}));
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
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": call_id,
                            "content": text,
                            "is_error": !result.ok,
                        }]
                    }));
                }
            }
        }

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                let schema = if t.input_schema.is_object() {
                    t.input_schema.clone()
                } else {
                    json!({})
                };
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": schema,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
            "stream": true,
        });
        if let Some(system) = &request.system_prompt {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn stream(
        &self,
        request: ModelRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, NormalizedEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/v1/messages", self.base_url);

        tokio::spawn(async move {
            let body = Self::build_body(&request);
            debug!(model = %request.model, "starting Anthropic stream");

            let response = client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    let body = r.text().await.unwrap_or_default();
                    let _ = tx.send(NormalizedEvent::Trace {
                        kind: "error".to_string(),
                        raw: body,
                    });
                    let _ = tx.send(NormalizedEvent::ResponseCompleted {
                        stop_reason: "error".to_string(),
                        usage: None,
                    });
                    return;
                }
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

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            // call_id -> (tool_name, args_buffer)
            let mut active_tool: Option<(String, String, String)> = None;
            let mut stop_reason = "end_turn".to_string();
            let mut usage: Option<Usage> = None;

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
                    chunk = byte_stream.next() => {
                        let Some(chunk) = chunk else { break };
                        let chunk: Bytes = match chunk {
                            Ok(c) => c,
                            Err(e) => {
                                let _ = tx.send(NormalizedEvent::Trace {
                                    kind: "error".to_string(),
                                    raw: e.to_string(),
                                });
                                break;
                            }
                        };
                        buffer.push_str(&String::from_utf8_lossy(&chunk));

                        while let Some(idx) = buffer.find("\n\n") {
                            let frame: String = buffer.drain(..idx + 2).collect();
                            process_frame(
                                &frame,
                                &tx,
                                &mut active_tool,
                                &mut stop_reason,
                                &mut usage,
                            );
                        }
                    }
                }
            }

            let _ = tx.send(NormalizedEvent::ResponseCompleted { stop_reason, usage });
        });

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

fn process_frame(
    frame: &str,
    tx: &tokio::sync::mpsc::UnboundedSender<NormalizedEvent>,
    active_tool: &mut Option<(String, String, String)>,
    stop_reason: &mut String,
    usage: &mut Option<Usage>,
) {
    let mut event_name = None;
    let mut data_line = None;
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_line = Some(rest.trim().to_string());
        }
    }

    let (Some(event_name), Some(data_line)) = (event_name, data_line) else {
        return;
    };

    let data: Value = match serde_json::from_str(&data_line) {
        Ok(v) => v,
        Err(_) => {
            let _ = tx.send(NormalizedEvent::Trace {
                kind: "parse_error".to_string(),
                raw: data_line,
            });
            return;
        }
    };

    match event_name.as_str() {
        "content_block_start" => {
            if let Some(block) = data.get("content_block") {
                if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                    let call_id = block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    *active_tool = Some((call_id.clone(), name.clone(), String::new()));
                    let _ = tx.send(NormalizedEvent::ToolCallStarted {
                        call_id,
                        tool_name: name,
                    });
                }
            }
        }
        "content_block_delta" => {
            if let Some(delta) = data.get("delta") {
                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("text_delta") => {
                        if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                            let _ = tx.send(NormalizedEvent::TextDelta {
                                text: text.to_string(),
                            });
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some((call_id, _, buf)) = active_tool.as_mut() {
                            if let Some(fragment) = delta.get("partial_json").and_then(|t| t.as_str())
                            {
                                buf.push_str(fragment);
                                let _ = tx.send(NormalizedEvent::ToolCallArgsDelta {
                                    call_id: call_id.clone(),
                                    fragment: fragment.to_string(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "content_block_stop" => {
            if let Some((call_id, tool_name, args_buf)) = active_tool.take() {
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
        }
        "message_delta" => {
            if let Some(reason) = data
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|r| r.as_str())
            {
                *stop_reason = normalize_stop_reason(reason);
            }
            if let Some(u) = data.get("usage") {
                let output = u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                let input = u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                *usage = Some(Usage {
                    prompt_tokens: input,
                    completion_tokens: output,
                    total_tokens: input + output,
                });
            }
        }
        "message_stop" | "ping" | "message_start" => {}
        "error" => {
            let _ = tx.send(NormalizedEvent::Trace {
                kind: "error".to_string(),
                raw: data_line,
            });
        }
        _ => {
            let _ = tx.send(NormalizedEvent::Trace {
                kind: "ignorable".to_string(),
                raw: data_line,
            });
        }
    }
}

fn normalize_stop_reason(reason: &str) -> String {
    match reason {
        "end_turn" | "stop_sequence" => "end_turn".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_stop_reason_maps_end_turn() {
        assert_eq!(normalize_stop_reason("end_turn"), "end_turn");
        assert_eq!(normalize_stop_reason("tool_use"), "tool_use");
    }

    #[test]
    fn process_frame_emits_text_delta() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut active = None;
        let mut stop_reason = "end_turn".to_string();
        let mut usage = None;
        let frame = "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n";
        process_frame(frame, &tx, &mut active, &mut stop_reason, &mut usage);
        let event = rx.try_recv().unwrap();
        match event {
            NormalizedEvent::TextDelta { text } => assert_eq!(text, "hi"),
            _ => panic!("expected TextDelta"),
        }
    }

    #[test]
    fn process_frame_buffers_tool_use_fragments() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut active = None;
        let mut stop_reason = "end_turn".to_string();
        let mut usage = None;

        let start = "event: content_block_start\ndata: {\"content_block\":{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"ReadFile\"}}\n\n";
        process_frame(start, &tx, &mut active, &mut stop_reason, &mut usage);
        assert!(matches!(rx.try_recv().unwrap(), NormalizedEvent::ToolCallStarted { .. }));

        let delta = "event: content_block_delta\ndata: {\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\"}}\n\n";
        process_frame(delta, &tx, &mut active, &mut stop_reason, &mut usage);
        assert!(matches!(rx.try_recv().unwrap(), NormalizedEvent::ToolCallArgsDelta { .. }));

        let stop = "event: content_block_stop\ndata: {}\n\n";
        process_frame(stop, &tx, &mut active, &mut stop_reason, &mut usage);
        match rx.try_recv().unwrap() {
            NormalizedEvent::ToolCallReady { args_json, .. } => {
                assert_eq!(args_json, "{\"path\":");
            }
            _ => panic!("expected ToolCallReady"),
        }
    }
}
