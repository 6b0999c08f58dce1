//! Spawns `git diff [--cached] [-- <file>]` and reports the result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_GIT_DIFF: &str = "GitDiff";

#[derive(Deserialize, Default)]
struct Args {
    #[serde(default)]
    staged: bool,
    file: Option<String>,
}

pub struct GitDiffTool;

impl GitDiffTool {
    pub fn new() -> Self {
        GitDiffTool
    }
}

impl Default for GitDiffTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        TOOL_GIT_DIFF
    }

    fn description(&self) -> &str {
        "Runs `git diff` (optionally `--cached`, optionally limited to one file) and returns the diff text."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "staged": {"type": "boolean", "description": "Diff staged changes (git diff --cached)."},
                "file": {"type": "string", "description": "Limit the diff to this path."}
            }
        })
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::read_only()
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ToolContext,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult, AgentError> {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::failure("InvalidArgs", e.to_string())),
        };

        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("diff");
        if args.staged {
            cmd.arg("--cached");
        }
        if let Some(file) = &args.file {
            cmd.arg("--").arg(file);
        }
        cmd.current_dir(ctx.workspace.root());

        let output = match cmd.output().await {
            Ok(o) => o,
            Err(e) => return Ok(ToolResult::failure("ToolExecutionError", e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Ok(ToolResult::failure("ToolExecutionError", stderr.clone()).with_stderr(stderr));
        }

        let diff = String::from_utf8_lossy(&output.stdout).to_string();
        let has_diff = !diff.trim().is_empty();

        Ok(ToolResult::success(json!({
            "staged": args.staged,
            "file": args.file,
            "hasDiff": has_diff,
            "diff": diff,
        }))
        .with_stdout(diff))
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
    async fn reports_no_diff_on_clean_repo() {
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
        let tool = GitDiffTool::new();
        let result = tool
            .execute(json!({}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.ok);
        assert!(!result.data.unwrap()["hasDiff"].as_bool().unwrap());
    }
}
