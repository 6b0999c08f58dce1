//! Session store and runtime: one entry per active agent session, each
//! driving its own [`engine::Orchestrator`] behind a per-session run lock.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use engine::approval::ServerApprovalArbitrator;
use engine::orchestrator::ChannelUiSink;
use engine::session::{session_log_path, SessionInfo, SessionLogWriter};
use engine::tool::{PolicyEngine, ToolContext, ToolRegistry};
use engine::workspace::WorkspaceGuard;
use engine::{AgentOptions, Message, Orchestrator, ServerEvent};
use serde::Deserialize;
use tokio::sync::{mpsc::UnboundedReceiver, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::ServeError;
use crate::provider::build_adapter;

/// Body of `POST /api/sessions` and `POST /api/sessions/{id}/resume`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub workspace_path: String,
    pub provider: String,
    pub model: Option<String>,
    #[serde(default)]
    pub openai_compatible_endpoint: Option<String>,
}

/// A running session: the turn loop, its conversation, and the plumbing the
/// endpoints poke at (events, approvals, the run lock).
pub struct SessionRuntime {
    pub info: SessionInfo,
    orchestrator: Orchestrator,
    approvals: Arc<ServerApprovalArbitrator>,
    messages: AsyncMutex<Vec<Message>>,
    run_lock: AsyncMutex<()>,
    events_rx: Arc<AsyncMutex<UnboundedReceiver<ServerEvent>>>,
    cancel: CancellationToken,
}

impl SessionRuntime {
    /// Dispatches one user turn against this session's orchestrator, holding
    /// the run lock for the duration so only one turn runs at a time.
    pub async fn chat(&self, message: String) -> Result<(), ServeError> {
        let _guard = self.run_lock.lock().await;
        let mut messages = self.messages.lock().await;
        self.orchestrator
            .run(&message, &mut messages, self.cancel.clone())
            .await
            .map_err(ServeError::from)
    }

    /// Resolves a pending approval for `call_id`. Returns `false` if no such
    /// pending call exists.
    pub fn resolve_approval(&self, call_id: &str, approved: bool) -> bool {
        self.approvals.try_resolve(call_id, approved)
    }

    /// Acquires the single-reader latch for the session's event stream.
    /// Returns `None` if a reader already holds it.
    pub fn try_acquire_stream(&self) -> Option<OwnedMutexGuard<UnboundedReceiver<ServerEvent>>> {
        self.events_rx.clone().try_lock_owned().ok()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Concurrent `id -> session runtime` map.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionRuntime>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: String, runtime: Arc<SessionRuntime>) {
        self.sessions.insert(id, runtime);
    }

    pub fn try_get(&self, id: &str) -> Option<Arc<SessionRuntime>> {
        self.sessions.get(id).map(|entry| entry.clone())
    }
}

/// Validates a creation request and builds a fresh [`SessionRuntime`],
/// optionally pre-populated with `resume_messages` read from an existing log.
pub fn build_runtime(
    id: &str,
    request: CreateSessionRequest,
    resume_messages: Vec<Message>,
) -> Result<SessionRuntime, ServeError> {
    let repo_root = PathBuf::from(&request.workspace_path);
    if !repo_root.is_dir() {
        return Err(ServeError::Validation(format!(
            "workspace path does not exist: {}",
            request.workspace_path
        )));
    }

    let provider = config::Provider::parse(&request.provider)
        .ok_or_else(|| ServeError::Validation(format!("unknown provider: {}", request.provider)))?;

    let (adapter, model) = build_adapter(
        provider,
        request.model.as_deref(),
        request.openai_compatible_endpoint.as_deref(),
    )?;

    let workspace = WorkspaceGuard::new(&repo_root)?;
    let log_path = session_log_path(&repo_root, id);
    let log = Arc::new(SessionLogWriter::open(&log_path)?);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let approvals = Arc::new(ServerApprovalArbitrator::new(tx.clone()));

    let options = AgentOptions {
        repo_root: repo_root.clone(),
        model: model.clone(),
        ..Default::default()
    };

    let tool_ctx = Arc::new(ToolContext {
        repo_root: repo_root.clone(),
        workspace,
        approvals: approvals.clone(),
    });

    let orchestrator = Orchestrator::new(
        options,
        adapter,
        Arc::new(ToolRegistry::with_default_tools()),
        PolicyEngine::new(false),
        tool_ctx,
        Some(log),
        Arc::new(ChannelUiSink::new(tx)),
    );

    let info = SessionInfo {
        id: id.to_string(),
        workspace_root: repo_root.display().to_string(),
        provider_name: provider.as_str().to_string(),
        model,
        created_at: Utc::now().to_rfc3339(),
    };

    Ok(SessionRuntime {
        info,
        orchestrator,
        approvals,
        messages: AsyncMutex::new(resume_messages),
        run_lock: AsyncMutex::new(()),
        events_rx: Arc::new(AsyncMutex::new(rx)),
        cancel: CancellationToken::new(),
    })
}

/// Reads back the message sequence an existing session log holds, for
/// `POST /api/sessions/{id}/resume`.
pub fn resume_messages(workspace_path: &str, id: &str) -> Result<Vec<Message>, ServeError> {
    let repo_root = PathBuf::from(workspace_path);
    let log_path = session_log_path(&repo_root, id);
    let (messages, warnings) = engine::session::read_session_log(&log_path)?;
    for warning in warnings {
        tracing::warn!(line = warning.line_number, reason = %warning.reason, "skipped malformed session log line");
    }
    Ok(messages)
}
