//! Walks under the workspace root applying a glob pattern, returning
//! relative, forward-slash paths.

use async_trait::async_trait;
use glob::Pattern;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_LIST_FILES: &str = "ListFiles";
const MAX_RESULTS: usize = 500;
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "bin", "obj"];

#[derive(Deserialize)]
struct Args {
    #[serde(default = "default_pattern")]
    pattern: String,
}

fn default_pattern() -> String {
    "**/*".to_string()
}

pub struct ListFilesTool;

impl ListFilesTool {
    pub fn new() -> Self {
        ListFilesTool
    }
}

impl Default for ListFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        TOOL_LIST_FILES
    }

    fn description(&self) -> &str {
        "Lists files under the workspace matching a glob pattern, excluding build and VCS directories."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern, e.g. '**/*.rs'. Defaults to '**/*'."}
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

        let glob_pattern = match Pattern::new(&args.pattern) {
            Ok(p) => p,
            Err(e) => {
                return Ok(ToolResult::failure(
                    "InvalidArgs",
                    format!("invalid glob pattern: {e}"),
                ))
            }
        };

        let root = ctx.workspace.root().to_path_buf();
        let mut paths: Vec<String> = Vec::new();

        for entry in WalkDir::new(&root).follow_links(false).into_iter().filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !EXCLUDED_DIRS.contains(&name))
                .unwrap_or(true)
        }) {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if glob_pattern.matches(&rel_str) {
                paths.push(rel_str);
                if paths.len() >= MAX_RESULTS {
                    break;
                }
            }
        }

        Ok(ToolResult::success(json!({ "paths": paths })))
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
    async fn lists_matching_files_and_excludes_git() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "").unwrap();
        fs::write(tmp.path().join("a.rs"), "").unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = ListFilesTool::new();
        let result = tool
            .execute(json!({"pattern": "**/*.rs"}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<String> = result.data.unwrap()["paths"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(paths, vec!["a.rs".to_string()]);
    }
}
