//! Starts a subprocess with an environment scrubbed of secret-like variables,
//! captures stdout/stderr up to a cap, and enforces a timeout by killing the
//! process tree. The child is placed in its own process group so both the
//! internal timeout and an external cancellation can kill the whole tree,
//! not just the direct child.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::{Risk, Tool, ToolContext, ToolPolicy};
use crate::error::AgentError;
use crate::message::ToolResult;

pub const TOOL_RUN_COMMAND: &str = "RunCommand";
const MAX_OUTPUT_CHARS: usize = 50_000;
const SECRET_FRAGMENTS: &[&str] = &[
    "API_KEY",
    "SECRET",
    "PASSWORD",
    "TOKEN",
    "CREDENTIAL",
    "PRIVATE_KEY",
    "AUTH",
];

#[derive(Deserialize)]
struct Args {
    exe: String,
    #[serde(default)]
    args: Vec<String>,
    cwd: Option<String>,
    #[serde(rename = "timeoutSec", default = "default_timeout")]
    timeout_sec: u64,
}

fn default_timeout() -> u64 {
    60
}

pub struct RunCommandTool;

impl RunCommandTool {
    pub fn new() -> Self {
        RunCommandTool
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

fn is_secret_var(name: &str) -> bool {
    let upper = name.to_uppercase();
    SECRET_FRAGMENTS.iter().any(|frag| upper.contains(frag))
}

fn truncate_chars(s: &str, max: usize) -> (String, bool) {
    if s.chars().count() <= max {
        (s.to_string(), false)
    } else {
        (s.chars().take(max).collect(), true)
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        TOOL_RUN_COMMAND
    }

    fn description(&self) -> &str {
        "Executes a subprocess with a scrubbed environment, bounded output, and a timeout."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "exe": {"type": "string", "description": "Executable to run."},
                "args": {"type": "array", "items": {"type": "string"}, "description": "Arguments."},
                "cwd": {"type": "string", "description": "Working directory, relative to the workspace root."},
                "timeoutSec": {"type": "integer", "description": "Timeout in seconds. Defaults to 60."}
            },
            "required": ["exe"]
        })
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::requires_approval(Risk::High)
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, AgentError> {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::failure("InvalidArgs", e.to_string())),
        };

        let cwd = match &args.cwd {
            Some(c) => match ctx.workspace.resolve(c) {
                Some(p) => p,
                None => {
                    return Ok(ToolResult::failure(
                        "UnsafePath",
                        format!("cwd is not allowed: {c}"),
                    ))
                }
            },
            None => ctx.workspace.root().to_path_buf(),
        };

        let mut cmd = tokio::process::Command::new(&args.exe);
        cmd.args(&args.args);
        cmd.current_dir(&cwd);
        cmd.kill_on_drop(true);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        for (key, _) in std::env::vars() {
            if is_secret_var(&key) {
                cmd.env_remove(key);
            }
        }

        let command_str = format!("{} {}", args.exe, args.args.join(" "));
        let started = Instant::now();

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::failure("ToolExecutionError", e.to_string())),
        };
        let pid = child.id();

        let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr is piped");
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let timeout = Duration::from_secs(args.timeout_sec);

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(Ok(status)) => status,
            Outcome::Exited(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Ok(ToolResult::failure("ToolExecutionError", e.to_string()));
            }
            Outcome::TimedOut | Outcome::Cancelled => {
                kill_process_tree(pid);
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                return Ok(match outcome {
                    Outcome::TimedOut => ToolResult::failure(
                        "Timeout",
                        format!("timed out after {}s", args.timeout_sec),
                    ),
                    _ => ToolResult::failure("Cancelled", "[cancelled]"),
                });
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        let duration_ms = started.elapsed().as_millis() as u64;
        let (stdout, stdout_truncated) =
            truncate_chars(&String::from_utf8_lossy(&stdout_bytes), MAX_OUTPUT_CHARS);
        let (stderr, stderr_truncated) =
            truncate_chars(&String::from_utf8_lossy(&stderr_bytes), MAX_OUTPUT_CHARS);
        let exit_code = status.code().unwrap_or(-1);

        let data = json!({
            "command": command_str,
            "exitCode": exit_code,
            "durationMs": duration_ms,
            "stdoutTruncated": stdout_truncated,
            "stderrTruncated": stderr_truncated,
        });

        let mut result = ToolResult {
            ok: status.success(),
            stdout: Some(stdout),
            stderr: Some(stderr),
            data: Some(data),
            diagnostics: Vec::new(),
        };

        if !status.success() {
            result.diagnostics.push(crate::message::Diagnostic {
                code: "ExitCode".to_string(),
                message: format!("command exited with code {exit_code}"),
                details: None,
            });
        }

        Ok(result)
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Kills the child's whole process group (it was spawned as its own group
/// leader via `process_group(0)`), not just the direct child, on both the
/// timeout and cancellation paths.
fn kill_process_tree(pid: Option<u32>) {
    let Some(pid) = pid else { return };

    #[cfg(unix)]
    {
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }

    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output();
    }
}
