//! Approval arbitration: one interface, two implementations.

mod server;
mod terminal;

pub use server::{ServerApprovalArbitrator, PendingApproval};
pub use terminal::TerminalApprovalArbitrator;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// Requests a yes/no decision for a tool call that requires approval.
#[async_trait]
pub trait ApprovalArbitrator: Send + Sync {
    async fn request_approval(
        &self,
        tool_name: &str,
        args_json: &str,
        call_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError>;
}
