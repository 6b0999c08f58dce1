//! Spawns `git status --porcelain -b` and parses the branch and change lines.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_GIT_STATUS: &str = "GitStatus";

pub struct GitStatusTool;

impl GitStatusTool {
    pub fn new() -> Self {
        GitStatusTool
    }
}

impl Default for GitStatusTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        TOOL_GIT_STATUS
    }

    fn description(&self) -> &str {
        "Reports the current branch and working tree changes via `git status --porcelain -b`."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::read_only()
    }

    async fn execute(
        &self,
        _args: Value,
        ctx: &ToolContext,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult, AgentError> {
        let output = match tokio::process::Command::new("git")
            .arg("status")
            .arg("--porcelain")
            .arg("-b")
            .current_dir(ctx.workspace.root())
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => return Ok(ToolResult::failure("ToolExecutionError", e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Ok(ToolResult::failure("ToolExecutionError", stderr.clone()).with_stderr(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let mut lines = stdout.lines();
        let branch_line = lines.next().unwrap_or("").trim_start_matches("## ");
        let branch = branch_line.split("...").next().unwrap_or("").to_string();

        let changes: Vec<Value> = lines
            .filter(|l| !l.is_empty())
            .map(|l| {
                let (code, file) = l.split_at(2.min(l.len()));
                json!({ "code": code.trim(), "file": file.trim() })
            })
            .collect();

        let clean = changes.is_empty();

        Ok(ToolResult::success(json!({
            "branch": branch,
            "changes": changes,
            "clean": clean,
        }))
        .with_stdout(stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::TerminalApprovalArbitrator;
    use crate::workspace::WorkspaceGuard;
    use std::process::Command;
    use std::sync::Arc;

    fn ctx_for(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            repo_root: dir.to_path_buf(),
            workspace: WorkspaceGuard::new(dir).unwrap(),
            approvals: Arc::new(TerminalApprovalArbitrator::new()),
        }
    }

    #[tokio::test]
    async fn reports_clean_repo() {
        let tmp = tempfile::tempdir().unwrap();
        Command::new("git").arg("init").current_dir(tmp.path()).output().unwrap();
        Command::new("git")
            .args(["config", "user.email", "a@b.c"])
            .current_dir(tmp.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "test"])
            .current_dir(tmp.path())
            .output()
            .unwrap();
        std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
        Command::new("git").args(["add", "."]).current_dir(tmp.path()).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(tmp.path())
            .output()
            .unwrap();

        let ctx = ctx_for(tmp.path());
        let tool = GitStatusTool::new();
        let result = tool
            .execute(json!({}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.ok);
        assert!(result.data.unwrap()["clean"].as_bool().unwrap());
    }
}
