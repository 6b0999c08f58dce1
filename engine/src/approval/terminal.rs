//! Synchronous terminal approval: print a prompt, read one line.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ApprovalArbitrator;
use crate::error::AgentError;

pub struct TerminalApprovalArbitrator;

impl TerminalApprovalArbitrator {
    pub fn new() -> Self {
        TerminalApprovalArbitrator
    }
}

impl Default for TerminalApprovalArbitrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalArbitrator for TerminalApprovalArbitrator {
    async fn request_approval(
        &self,
        tool_name: &str,
        args_json: &str,
        _call_id: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        use std::io::Write;

        println!("Approve {tool_name} with args {args_json}? [y/N]");
        std::io::stdout().flush().ok();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            line
        })
        .await
        .map_err(|e| AgentError::ToolExecution(e.to_string()))?;

        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}
