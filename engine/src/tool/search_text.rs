//! Case-insensitive regex search across the workspace. Prefers an external
//! fast-grep binary on `PATH` (invoked with JSON output) and falls back to a
//! manual walk otherwise.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_SEARCH_TEXT: &str = "SearchText";
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "bin", "obj"];
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "zip", "gz", "tar", "exe", "dll", "so",
    "dylib", "bin", "class", "wasm",
];
const FAST_GREP_BIN: &str = "rg";

#[derive(Deserialize)]
struct Args {
    pattern: String,
    #[serde(default = "default_max_results")]
    #[serde(rename = "maxResults")]
    max_results: usize,
}

fn default_max_results() -> usize {
    50
}

pub struct SearchTextTool;

impl SearchTextTool {
    pub fn new() -> Self {
        SearchTextTool
    }
}

impl Default for SearchTextTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTextTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_TEXT
    }

    fn description(&self) -> &str {
        "Searches file contents under the workspace with a case-insensitive regular expression."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regular expression to search for."},
                "maxResults": {"type": "integer", "description": "Maximum number of matches to return. Defaults to 50."}
            },
            "required": ["pattern"]
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

        let re = match RegexBuilder::new(&args.pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(e) => {
                return Ok(ToolResult::failure(
                    "InvalidArgs",
                    format!("invalid regex: {e}"),
                ))
            }
        };

        let root = ctx.workspace.root().to_path_buf();

        if let Some(fast_grep) = which::which(FAST_GREP_BIN).ok() {
            if let Some(matches) =
                run_fast_grep(&fast_grep, &args.pattern, &root, args.max_results)
            {
                return Ok(ToolResult::success(json!({ "matches": matches })));
            }
        }

        let matches = manual_search(&re, &root, args.max_results);
        Ok(ToolResult::success(json!({ "matches": matches })))
    }
}

fn manual_search(re: &regex::Regex, root: &std::path::Path, max_results: usize) -> Vec<Value> {
    let mut matches = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
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
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for (idx, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(json!({
                    "file": rel,
                    "line": idx + 1,
                    "content": line,
                }));
                if matches.len() >= max_results {
                    return matches;
                }
            }
        }
    }
    matches
}

/// Invokes a fast-grep binary with JSON output; returns `None` if the
/// invocation itself fails (callers should fall back to a manual search).
fn run_fast_grep(
    bin: &std::path::Path,
    pattern: &str,
    root: &std::path::Path,
    max_results: usize,
) -> Option<Vec<Value>> {
    let output = std::process::Command::new(bin)
        .arg("--json")
        .arg("-i")
        .arg(pattern)
        .arg(root)
        .output()
        .ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches = Vec::new();
    for line in stdout.lines() {
        let parsed: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if parsed.get("type").and_then(|t| t.as_str()) != Some("match") {
            continue;
        }
        let data = parsed.get("data")?;
        let path = data.get("path")?.get("text")?.as_str()?;
        let rel = std::path::Path::new(path)
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.to_string());
        let line_num = data.get("line_number")?.as_u64()?;
        let text = data.get("lines")?.get("text")?.as_str()?.trim_end();
        matches.push(json!({ "file": rel, "line": line_num, "content": text }));
        if matches.len() >= max_results {
            break;
        }
    }
    Some(matches)
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
    async fn finds_matches_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "Hello World\nfoo bar").unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = SearchTextTool::new();
        let result = tool
            .execute(json!({"pattern": "hello"}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        let matches = result.data.unwrap()["matches"].as_array().unwrap().len();
        assert_eq!(matches, 1);
    }

    #[tokio::test]
    async fn invalid_regex_is_a_diagnostic_not_a_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_for(tmp.path());
        let tool = SearchTextTool::new();
        let result = tool
            .execute(json!({"pattern": "("}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.ok);
    }
}
