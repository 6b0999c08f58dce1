//! Thread-safe, append-only JSONL writer. Flushes after every line; a
//! serialization failure is recorded as a synthetic error entry instead of
//! raising to the caller.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;

use crate::message::Message;

pub struct SessionLogWriter {
    file: Mutex<File>,
}

impl SessionLogWriter {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, data: Value) {
        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        });

        let line = match serde_json::to_string(&entry) {
            Ok(l) => l,
            Err(e) => {
                let fallback = serde_json::json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "data": {"type": "error", "message": format!("serialization failed: {e}")},
                });
                fallback.to_string()
            }
        };

        let mut file = self.file.lock().unwrap();
        if writeln!(file, "{line}").is_ok() {
            let _ = file.flush();
        }
    }

    pub fn append_message(&self, message: &Message) {
        let mut data = match serde_json::to_value(message) {
            Ok(v) => v,
            Err(_) => return,
        };
        if let Some(obj) = data.as_object_mut() {
            obj.insert("type".to_string(), Value::String("message".to_string()));
        }
        self.write_line(data);
    }

    pub fn append_diagnostic(&self, kind: &str, mut payload: Value) {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("type".to_string(), Value::String(kind.to_string()));
        }
        self.write_line(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn writes_newline_delimited_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        let writer = SessionLogWriter::open(&path).unwrap();
        writer.append_message(&Message::User {
            content: "hi".to_string(),
        });
        writer.append_diagnostic("session_start", serde_json::json!({"id": "s1"}));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("timestamp").is_some());
            assert!(parsed.get("data").is_some());
        }
    }
}
