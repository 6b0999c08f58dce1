//! Append-only session log persistence and resumption.

mod log;
mod reader;

pub use log::SessionLogWriter;
pub use reader::{read_session_log, ReadWarning};

use serde::{Deserialize, Serialize};

/// Durable identity of one session: a durable identifier plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub workspace_root: String,
    pub provider_name: String,
    pub model: String,
    pub created_at: String,
}

/// Path to a session's log file, `<repo_root>/.agent/session_<id>.jsonl`.
pub fn session_log_path(repo_root: &std::path::Path, id: &str) -> std::path::PathBuf {
    repo_root.join(".agent").join(format!("session_{id}.jsonl"))
}

/// Path to the index file, `<repo_root>/.agent/sessions.jsonl`.
pub fn sessions_index_path(repo_root: &std::path::Path) -> std::path::PathBuf {
    repo_root.join(".agent").join("sessions.jsonl")
}
