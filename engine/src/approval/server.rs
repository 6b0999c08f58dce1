//! Asynchronous, wire-based approval: emits `approval_required` on the
//! session's event channel and resolves via an out-of-band `try_resolve`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio_util::sync::CancellationToken;

use super::ApprovalArbitrator;
use crate::error::AgentError;
use crate::event::ServerEvent;

/// A single pending approval, keyed by `call_id`.
pub struct PendingApproval {
    resolver: oneshot::Sender<bool>,
}

/// Server-side arbitrator: one per session runtime.
pub struct ServerApprovalArbitrator {
    events: UnboundedSender<ServerEvent>,
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl ServerApprovalArbitrator {
    pub fn new(events: UnboundedSender<ServerEvent>) -> Self {
        Self {
            events,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a pending approval. Returns `true` if a pending entry for
    /// `call_id` was found and resolved, `false` otherwise.
    pub fn try_resolve(&self, call_id: &str, approved: bool) -> bool {
        let pending = self.pending.lock().unwrap().remove(call_id);
        match pending {
            Some(p) => {
                let _ = p.resolver.send(approved);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ApprovalArbitrator for ServerApprovalArbitrator {
    async fn request_approval(
        &self,
        tool_name: &str,
        args_json: &str,
        call_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let call_id = call_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(call_id.clone(), PendingApproval { resolver: tx });

        let _ = self.events.send(ServerEvent::ApprovalRequired {
            call_id: call_id.clone(),
            tool: tool_name.to_string(),
            args_json: args_json.to_string(),
            reason: "tool requires approval".to_string(),
        });

        tokio::select! {
            resolved = rx => resolved.map_err(|_| AgentError::Cancelled),
            _ = cancel.cancelled() => {
                self.pending.lock().unwrap().remove(&call_id);
                Err(AgentError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_pending_approval() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let arbitrator = std::sync::Arc::new(ServerApprovalArbitrator::new(tx));
        let cancel = CancellationToken::new();

        let arb2 = arbitrator.clone();
        let handle = tokio::spawn(async move {
            arb2.request_approval("RunCommand", "{}", Some("c1"), &cancel)
                .await
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "approval_required");

        assert!(arbitrator.try_resolve("c1", true));
        let result = handle.await.unwrap().unwrap();
        assert!(result);
    }

    #[tokio::test]
    async fn cancellation_resolves_with_cancelled_error() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let arbitrator = ServerApprovalArbitrator::new(tx);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = arbitrator
            .request_approval("RunCommand", "{}", Some("c2"), &cancel)
            .await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }
}
