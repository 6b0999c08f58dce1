//! Reconstructs the conversation from a session log, skipping any line that
//! fails to parse or whose payload `type ≠ "message"`.

use std::path::Path;

use serde_json::Value;

use crate::message::{Message, ToolCall, ToolResult};

/// A line the reader could not use, reported but not fatal.
#[derive(Debug, Clone)]
pub struct ReadWarning {
    pub line_number: usize,
    pub reason: String,
}

/// Reads `path` and reconstructs the ordered message sequence.
///
/// Lines with `data.type != "message"` are diagnostic and silently skipped.
/// Lines that fail to parse, or whose `message` payload is malformed, are
/// reported via `warnings` and skipped — the reader never aborts the file.
pub fn read_session_log(path: &Path) -> std::io::Result<(Vec<Message>, Vec<ReadWarning>)> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
        Err(e) => return Err(e),
    };

    let mut messages = Vec::new();
    let mut warnings = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = idx + 1;

        let entry: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(ReadWarning {
                    line_number,
                    reason: format!("invalid JSON: {e}"),
                });
                continue;
            }
        };

        let data = match entry.get("data") {
            Some(d) => d,
            None => {
                warnings.push(ReadWarning {
                    line_number,
                    reason: "missing data field".to_string(),
                });
                continue;
            }
        };

        let kind = data.get("type").and_then(|t| t.as_str()).unwrap_or("");
        if kind != "message" {
            continue;
        }

        match parse_message(data) {
            Ok(msg) => messages.push(msg),
            Err(reason) => warnings.push(ReadWarning { line_number, reason }),
        }
    }

    Ok((messages, warnings))
}

fn parse_message(data: &Value) -> Result<Message, String> {
    let role = data
        .get("role")
        .and_then(|r| r.as_str())
        .ok_or_else(|| "missing role".to_string())?;

    match role {
        "user" => {
            let content = data
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or_else(|| "user message missing content".to_string())?;
            Ok(Message::User {
                content: content.to_string(),
            })
        }
        "assistant" => {
            let content = data
                .get("content")
                .and_then(|c| c.as_str())
                .map(|s| s.to_string());
            let tool_calls = data
                .get("toolCalls")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|tc| {
                            Some(ToolCall {
                                call_id: tc.get("callId")?.as_str()?.to_string(),
                                name: tc.get("name")?.as_str()?.to_string(),
                                args_json: tc.get("argsJson")?.as_str()?.to_string(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Message::Assistant { content, tool_calls })
        }
        "tool" => {
            let call_id = data
                .get("callId")
                .and_then(|c| c.as_str())
                .ok_or_else(|| "tool message missing callId".to_string())?
                .to_string();
            let tool_name = data
                .get("toolName")
                .and_then(|c| c.as_str())
                .ok_or_else(|| "tool message missing toolName".to_string())?
                .to_string();
            let result: ToolResult = data
                .get("result")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| format!("invalid tool result: {e}"))?
                .unwrap_or_default();
            Ok(Message::Tool {
                call_id,
                tool_name,
                result,
            })
        }
        other => Err(format!("unknown message role: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::log::SessionLogWriter;

    #[test]
    fn round_trips_written_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        let writer = SessionLogWriter::open(&path).unwrap();

        let original = vec![
            Message::User {
                content: "hi".to_string(),
            },
            Message::Assistant {
                content: Some("ok".to_string()),
                tool_calls: vec![ToolCall {
                    call_id: "c1".to_string(),
                    name: "ReadFile".to_string(),
                    args_json: "{}".to_string(),
                }],
            },
            Message::Tool {
                call_id: "c1".to_string(),
                tool_name: "ReadFile".to_string(),
                result: ToolResult {
                    ok: true,
                    ..Default::default()
                },
            },
        ];
        for m in &original {
            writer.append_message(m);
        }

        let (read_back, warnings) = read_session_log(&path).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(read_back, original);
    }

    #[test]
    fn skips_malformed_lines_without_aborting() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        std::fs::write(
            &path,
            "not json at all\n{\"timestamp\":\"x\",\"data\":{\"type\":\"message\",\"role\":\"user\",\"content\":\"hi\"}}\n",
        )
        .unwrap();

        let (messages, warnings) = read_session_log(&path).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn ignores_diagnostic_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        let writer = SessionLogWriter::open(&path).unwrap();
        writer.append_diagnostic("session_start", serde_json::json!({"id": "s1"}));
        writer.append_message(&Message::User {
            content: "hi".to_string(),
        });

        let (messages, warnings) = read_session_log(&path).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_file_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("does_not_exist.jsonl");
        let (messages, warnings) = read_session_log(&path).unwrap();
        assert!(messages.is_empty());
        assert!(warnings.is_empty());
    }
}
