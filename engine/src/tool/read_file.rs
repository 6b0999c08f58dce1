//! Reads a file resolved through the workspace guard, with an optional
//! inclusive line range.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_READ_FILE: &str = "ReadFile";

#[derive(Deserialize)]
struct Args {
    path: String,
    #[serde(rename = "startLine")]
    start_line: Option<usize>,
    #[serde(rename = "endLine")]
    end_line: Option<usize>,
}

pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        ReadFileTool
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        TOOL_READ_FILE
    }

    fn description(&self) -> &str {
        "Reads a text file under the workspace, optionally limited to an inclusive line range."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the workspace root."},
                "startLine": {"type": "integer", "description": "1-based inclusive start line."},
                "endLine": {"type": "integer", "description": "1-based inclusive end line."}
            },
            "required": ["path"]
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

        let resolved = match ctx.workspace.resolve(&args.path) {
            Some(p) => p,
            None => {
                return Ok(ToolResult::failure(
                    "UnsafePath",
                    format!("path is not allowed: {}", args.path),
                ))
            }
        };

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return Ok(ToolResult::failure("NotFound", e.to_string())),
        };

        let lines: Vec<&str> = text.lines().collect();
        let total_lines = lines.len();
        let start = args.start_line.unwrap_or(1).max(1).min(total_lines.max(1));
        let end = args
            .end_line
            .unwrap_or(total_lines)
            .max(start)
            .min(total_lines.max(1));

        let content = if total_lines == 0 {
            String::new()
        } else {
            lines[(start - 1)..end].join("\n")
        };

        Ok(ToolResult::success(json!({
            "path": args.path,
            "startLine": start,
            "endLine": end,
            "totalLines": total_lines,
            "content": content,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::TerminalApprovalArbitrator;
    use crate::workspace::WorkspaceGuard;
    use std::fs;
    use std::sync::Arc;

    fn ctx_for(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            repo_root: dir.to_path_buf(),
            workspace: WorkspaceGuard::new(dir).unwrap(),
            approvals: Arc::new(TerminalApprovalArbitrator::new()),
        }
    }

    #[tokio::test]
    async fn reads_inclusive_range() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("multiline.txt"),
            "line1\nline2\nline3\nline4\nline5",
        )
        .unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = ReadFileTool::new();
        let result = tool
            .execute(
                json!({"path": "multiline.txt", "startLine": 2, "endLine": 4}),
                &ctx,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.ok);
        let content = result.data.unwrap()["content"].as_str().unwrap().to_string();
        assert!(content.contains("line2"));
        assert!(content.contains("line3"));
        assert!(content.contains("line4"));
        assert!(!content.contains("line1"));
        assert!(!content.contains("line5"));
    }

    #[tokio::test]
    async fn fails_on_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = ReadFileTool::new();
        let result = tool
            .execute(json!({"path": "missing.txt"}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn refuses_unsafe_path() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = ReadFileTool::new();
        let result = tool
            .execute(
                json!({"path": "../etc/passwd"}),
                &ctx,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.diagnostics[0].code, "UnsafePath");
    }
}
