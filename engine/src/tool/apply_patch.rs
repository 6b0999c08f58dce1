//! Applies a patch, in either unified-diff form or the "Begin Patch" envelope
//! form. Tries `git apply` first, then falls back to an in-process applier.
//!
//! The fallback applies hunks per file in descending `old_start` order so
//! that line numbers from earlier hunks are unaffected by later edits lower
//! in the file — this mirrors the coarse, context-unverified behavior of the
//! reference implementation rather than a fully robust patch engine.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Risk, Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_APPLY_PATCH: &str = "ApplyPatch";

#[derive(Deserialize)]
struct Args {
    patch: String,
}

pub struct ApplyPatchTool;

impl ApplyPatchTool {
    pub fn new() -> Self {
        ApplyPatchTool
    }
}

impl Default for ApplyPatchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        TOOL_APPLY_PATCH
    }

    fn description(&self) -> &str {
        "Applies a unified diff (or a Begin/Add/Update/Delete patch envelope) to files in the workspace."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patch": {"type": "string", "description": "Unified diff text, or a Begin Patch envelope."}
            },
            "required": ["patch"]
        })
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::requires_approval(Risk::Medium)
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

        let is_envelope = args.patch.trim_start().starts_with("*** Begin Patch");

        if !is_envelope {
            if let Some(result) = try_git_apply(&args.patch, ctx.workspace.root()).await {
                return Ok(result);
            }
        }

        let file_patches = if is_envelope {
            match parse_envelope(&args.patch) {
                Ok(p) => p,
                Err(e) => return Ok(ToolResult::failure("InvalidArgs", e)),
            }
        } else {
            match parse_unified_diff(&args.patch) {
                Ok(p) => p,
                Err(e) => return Ok(ToolResult::failure("InvalidArgs", e)),
            }
        };

        if file_patches.is_empty() {
            return Ok(ToolResult::failure("InvalidArgs", "patch contains no file changes"));
        }

        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for patch in file_patches {
            match apply_file_patch(&patch, ctx) {
                Ok(path) => applied.push(path),
                Err((path, reason)) => failed.push(json!({"path": path, "reason": reason})),
            }
        }

        if applied.is_empty() {
            return Ok(ToolResult::failure(
                "ApplyFailed",
                "no file patches could be applied",
            ));
        }

        let mut result = ToolResult::success(json!({
            "applied": applied,
            "failedPatches": failed,
        }));

        if !failed.is_empty() {
            result.diagnostics.push(crate::message::Diagnostic {
                code: "PartialApply".to_string(),
                message: format!("{} of {} file patches failed", failed.len(), failed.len() + applied.len()),
                details: Some(json!({ "failedPatches": failed })),
            });
        }

        Ok(result)
    }
}

/// Attempts `git apply --check` then `git apply` on the raw unified-diff
/// text. Returns `None` (meaning "try the in-process fallback") if either
/// step fails; returns `Some` only on a clean apply.
async fn try_git_apply(patch: &str, root: &std::path::Path) -> Option<ToolResult> {
    use tokio::io::AsyncWriteExt;

    let run_git = |args: &[&str], patch: String, root: std::path::PathBuf| async move {
        let mut child = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&root)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .ok()?;
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(patch.as_bytes()).await;
        }
        child.wait_with_output().await.ok()
    };

    let check = run_git(&["apply", "--check", "-"], patch.to_string(), root.to_path_buf()).await?;
    if !check.status.success() {
        return None;
    }

    let apply = run_git(&["apply", "-"], patch.to_string(), root.to_path_buf()).await?;
    if !apply.status.success() {
        return None;
    }

    Some(ToolResult::success(json!({ "appliedVia": "git apply" })))
}

#[derive(Debug, Clone)]
enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    old_lines: usize,
    lines: Vec<HunkLine>,
}

#[derive(Debug, Clone)]
struct FilePatch {
    old_path: Option<String>,
    new_path: Option<String>,
    is_delete: bool,
    hunks: Vec<Hunk>,
}

fn strip_path_prefix(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw == "/dev/null" {
        return None;
    }
    let stripped = raw.strip_prefix("a/").or_else(|| raw.strip_prefix("b/")).unwrap_or(raw);
    Some(stripped.to_string())
}

fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    // "@@ -old_start,old_lines +new_start,new_lines @@ ..."
    let inner = line.strip_prefix("@@ ")?;
    let end = inner.find(" @@")?;
    let spans = &inner[..end];
    let mut parts = spans.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let (old_start, old_lines) = match old.split_once(',') {
        Some((s, l)) => (s.parse().ok()?, l.parse().ok()?),
        None => (old.parse().ok()?, 1),
    };
    Some((old_start, old_lines))
}

fn parse_unified_diff(text: &str) -> Result<Vec<FilePatch>, String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut patches = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].starts_with("--- ") {
            i += 1;
            continue;
        }
        let old_raw = lines[i][4..].split('\t').next().unwrap_or("").to_string();
        i += 1;
        if i >= lines.len() || !lines[i].starts_with("+++ ") {
            return Err("expected +++ line after ---".to_string());
        }
        let new_raw = lines[i][4..].split('\t').next().unwrap_or("").to_string();
        i += 1;

        let old_path = strip_path_prefix(&old_raw);
        let new_path = strip_path_prefix(&new_raw);
        let is_delete = new_path.is_none();

        let mut hunks = Vec::new();
        while i < lines.len() && lines[i].starts_with("@@ ") {
            let (old_start, old_lines) = parse_hunk_header(lines[i])
                .ok_or_else(|| format!("malformed hunk header: {}", lines[i]))?;
            i += 1;
            let mut hunk_lines = Vec::new();
            while i < lines.len()
                && !lines[i].starts_with("@@ ")
                && !lines[i].starts_with("--- ")
            {
                let l = lines[i];
                if let Some(rest) = l.strip_prefix('+') {
                    hunk_lines.push(HunkLine::Add(rest.to_string()));
                } else if let Some(rest) = l.strip_prefix('-') {
                    hunk_lines.push(HunkLine::Remove(rest.to_string()));
                } else if let Some(rest) = l.strip_prefix(' ') {
                    hunk_lines.push(HunkLine::Context(rest.to_string()));
                } else if l.is_empty() {
                    hunk_lines.push(HunkLine::Context(String::new()));
                }
                i += 1;
            }
            hunks.push(Hunk {
                old_start,
                old_lines,
                lines: hunk_lines,
            });
        }

        patches.push(FilePatch {
            old_path,
            new_path,
            is_delete,
            hunks,
        });
    }

    Ok(patches)
}

fn parse_envelope(text: &str) -> Result<Vec<FilePatch>, String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut patches = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        if let Some(path) = line.strip_prefix("*** Add File: ") {
            i += 1;
            let mut hunk_lines = Vec::new();
            while i < lines.len() && !lines[i].starts_with("***") {
                if let Some(rest) = lines[i].strip_prefix('+') {
                    hunk_lines.push(HunkLine::Add(rest.to_string()));
                }
                i += 1;
            }
            patches.push(FilePatch {
                old_path: None,
                new_path: Some(path.to_string()),
                is_delete: false,
                hunks: vec![Hunk {
                    old_start: 0,
                    old_lines: 0,
                    lines: hunk_lines,
                }],
            });
        } else if let Some(path) = line.strip_prefix("*** Delete File: ") {
            patches.push(FilePatch {
                old_path: Some(path.to_string()),
                new_path: None,
                is_delete: true,
                hunks: vec![],
            });
            i += 1;
        } else if let Some(path) = line.strip_prefix("*** Update File: ") {
            i += 1;
            let mut hunks = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with("@@") {
                let (old_start, old_lines) =
                    parse_hunk_header(&format!("{} @@", lines[i].trim())).unwrap_or((0, 0));
                i += 1;
                let mut hunk_lines = Vec::new();
                while i < lines.len() && !lines[i].starts_with("***") && !lines[i].trim_start().starts_with("@@")
                {
                    let l = lines[i];
                    if let Some(rest) = l.strip_prefix('+') {
                        hunk_lines.push(HunkLine::Add(rest.to_string()));
                    } else if let Some(rest) = l.strip_prefix('-') {
                        hunk_lines.push(HunkLine::Remove(rest.to_string()));
                    } else if let Some(rest) = l.strip_prefix(' ') {
                        hunk_lines.push(HunkLine::Context(rest.to_string()));
                    }
                    i += 1;
                }
                hunks.push(Hunk {
                    old_start,
                    old_lines,
                    lines: hunk_lines,
                });
            }
            patches.push(FilePatch {
                old_path: Some(path.to_string()),
                new_path: Some(path.to_string()),
                is_delete: false,
                hunks,
            });
        } else {
            i += 1;
        }
    }

    Ok(patches)
}

fn apply_hunk(lines: &mut Vec<String>, hunk: &Hunk) {
    let mut replacement = Vec::new();
    for hl in &hunk.lines {
        match hl {
            HunkLine::Context(s) => replacement.push(s.clone()),
            HunkLine::Add(s) => replacement.push(s.clone()),
            HunkLine::Remove(_) => {}
        }
    }
    let start = hunk.old_start.saturating_sub(1).min(lines.len());
    let end = (start + hunk.old_lines).min(lines.len());
    lines.splice(start..end, replacement);
}

fn apply_file_patch(patch: &FilePatch, ctx: &ToolContext) -> Result<String, (String, String)> {
    let target_rel = patch
        .new_path
        .clone()
        .or_else(|| patch.old_path.clone())
        .unwrap_or_default();

    let resolved = match ctx.workspace.resolve(&target_rel) {
        Some(p) => p,
        None => return Err((target_rel, "path is outside the workspace".to_string())),
    };

    if patch.is_delete {
        if resolved.exists() {
            if let Err(e) = std::fs::remove_file(&resolved) {
                return Err((target_rel, e.to_string()));
            }
        }
        return Ok(target_rel);
    }

    let mut lines: Vec<String> = if resolved.exists() {
        match std::fs::read_to_string(&resolved) {
            Ok(content) => content.lines().map(|l| l.to_string()).collect(),
            Err(e) => return Err((target_rel, e.to_string())),
        }
    } else {
        Vec::new()
    };

    let mut hunks = patch.hunks.clone();
    hunks.sort_by(|a, b| b.old_start.cmp(&a.old_start));
    for hunk in &hunks {
        apply_hunk(&mut lines, hunk);
    }

    if let Some(parent) = resolved.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return Err((target_rel, e.to_string()));
        }
    }

    let content = if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    };

    if let Err(e) = std::fs::write(&resolved, content) {
        return Err((target_rel, e.to_string()));
    }

    Ok(target_rel)
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

    fn init_repo(dir: &std::path::Path) {
        Command::new("git").arg("init").current_dir(dir).output().unwrap();
        Command::new("git")
            .args(["config", "user.email", "a@b.c"])
            .current_dir(dir)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "test"])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    #[tokio::test]
    async fn creates_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        let ctx = ctx_for(tmp.path());
        let tool = ApplyPatchTool::new();
        let patch = "--- a/new.txt\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
        let result = tool
            .execute(json!({"patch": patch}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.ok);
        let content = std::fs::read_to_string(tmp.path().join("new.txt")).unwrap();
        assert!(content.contains("hello"));
        assert!(content.contains("world"));
    }

    #[tokio::test]
    async fn partial_apply_reports_failed_patches() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("good.txt"), "line1\nline2\n").unwrap();

        let ctx = ctx_for(tmp.path());
        let tool = ApplyPatchTool::new();
        let patch = concat!(
            "--- a/good.txt\n",
            "+++ b/good.txt\n",
            "@@ -1,1 +1,1 @@\n",
            "-line1\n",
            "+line1-updated\n",
            "--- a/../evil.txt\n",
            "+++ b/../evil.txt\n",
            "@@ -0,0 +1,1 @@\n",
            "+pwned\n",
        );
        let result = tool
            .execute(json!({"patch": patch}), &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.ok);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == "PartialApply"));
        let content = std::fs::read_to_string(tmp.path().join("good.txt")).unwrap();
        assert!(content.contains("line1-updated"));
    }
}
