//! Tool contract, registry, policy engine, and the concrete tool set.

pub(crate) mod apply_patch;
pub(crate) mod git_diff;
pub(crate) mod git_status;
pub(crate) mod list_files;
mod policy;
pub(crate) mod read_file;
mod registry;
pub(crate) mod run_command;
pub(crate) mod search_text;

pub use apply_patch::ApplyPatchTool;
pub use git_diff::GitDiffTool;
pub use git_status::GitStatusTool;
pub use list_files::ListFilesTool;
pub use policy::{PolicyDecision, PolicyEngine};
pub use read_file::ReadFileTool;
pub use registry::ToolRegistry;
pub use run_command::RunCommandTool;
pub use search_text::SearchTextTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalArbitrator;
use crate::error::AgentError;
use crate::message::ToolResult;
use crate::workspace::WorkspaceGuard;

/// Risk tier attached to a tool's static policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Risk {
    Low,
    Medium,
    High,
}

/// A tool's static, pre-argument-inspection policy.
#[derive(Debug, Clone, Copy)]
pub struct ToolPolicy {
    pub requires_approval: bool,
    pub is_read_only: bool,
    pub risk: Risk,
}

impl ToolPolicy {
    pub const fn read_only() -> Self {
        ToolPolicy {
            requires_approval: false,
            is_read_only: true,
            risk: Risk::Low,
        }
    }

    pub const fn requires_approval(risk: Risk) -> Self {
        ToolPolicy {
            requires_approval: true,
            is_read_only: false,
            risk,
        }
    }
}

/// Descriptor surfaced to the provider adapter for building the model request.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub policy: ToolPolicy,
}

/// Execution context threaded into every tool call.
pub struct ToolContext {
    pub repo_root: std::path::PathBuf,
    pub workspace: WorkspaceGuard,
    pub approvals: Arc<dyn ApprovalArbitrator>,
}

/// The contract every concrete tool implements.
///
/// Tools are stateless values; they must never panic for predictable
/// failures — those become a failed [`ToolResult`] instead.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn policy(&self) -> ToolPolicy;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            policy: self.policy(),
        }
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, AgentError>;
}
