//! Terminal front-end: a line-based REPL that drives one agent session
//! against a workspace directory, per the interactive surface described in
//! the engine's session/orchestrator contract.

mod log_format;
mod logging;
mod provider;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use engine::approval::TerminalApprovalArbitrator;
use engine::orchestrator::TerminalUiSink;
use engine::session::{session_log_path, sessions_index_path, SessionLogWriter};
use engine::tool::{PolicyEngine, ToolContext, ToolRegistry};
use engine::workspace::WorkspaceGuard;
use engine::{AgentOptions, Message, Orchestrator};

const APP_NAME: &str = "relay";

/// Terminal front-end for the relay coding assistant.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Interactive coding-assistant session")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Repository root the agent's tools are confined to.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Model provider: openai, anthropic, or openai-compatible. Defaults to
    /// the resolved config value (see the `config` crate), itself `openai`
    /// absent any override.
    #[arg(long)]
    provider: Option<String>,

    /// Model name; defaults are provider-specific.
    #[arg(long)]
    model: Option<String>,

    /// Resume an existing session id instead of starting a new one.
    #[arg(long)]
    session: Option<String>,

    /// Skip interactive approval prompts; every tool call is allowed.
    #[arg(long)]
    auto_approve: bool,

    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG` if set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Runs the HTTP + SSE server exposing sessions over the engine (see `serve::run_serve`).
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct ServeArgs {
    /// Listen address, default 127.0.0.1:8080.
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level);

    if let Some(Command::Serve(serve_args)) = &args.command {
        if let Err(e) = config::load_and_apply(APP_NAME, Some(&args.workspace)) {
            eprintln!("[Error] config load failed: {e}");
            return ExitCode::FAILURE;
        }
        return match serve::run_serve(serve_args.addr.as_deref()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("[Error] serve error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("[Error] {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    config::load_and_apply(APP_NAME, Some(&args.workspace))
        .map_err(|e| format!("config load failed: {e}"))?;

    let repo_root = args
        .workspace
        .canonicalize()
        .map_err(|e| format!("workspace does not exist: {}: {e}", args.workspace.display()))?;
    let workspace = WorkspaceGuard::new(&repo_root)
        .map_err(|e| format!("workspace is not a directory: {e}"))?;

    let agent_config = config::AgentConfig::resolve(APP_NAME).map_err(|e| e.to_string())?;
    let selected_provider = match &args.provider {
        Some(p) => config::Provider::parse(p).ok_or_else(|| format!("unknown provider: {p}"))?,
        None => agent_config.provider,
    };
    let requested_model = args.model.clone().or(agent_config.model);

    let (adapter, model) = provider::build_adapter(
        selected_provider,
        requested_model.as_deref(),
        agent_config.openai_compatible_endpoint.as_deref(),
    )?;

    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let log_path = session_log_path(&repo_root, &session_id);

    let mut messages = if args.session.is_some() {
        let (messages, warnings) =
            engine::session::read_session_log(&log_path).map_err(|e| e.to_string())?;
        for warning in &warnings {
            tracing::warn!(
                line = warning.line_number,
                reason = %warning.reason,
                "skipped malformed session log line"
            );
        }
        messages
    } else {
        Vec::new()
    };

    let log = Arc::new(SessionLogWriter::open(&log_path).map_err(|e| e.to_string())?);
    log.append_diagnostic(
        "session_start",
        serde_json::json!({
            "id": session_id,
            "provider": selected_provider.as_str(),
            "model": model,
            "resumed": args.session.is_some(),
        }),
    );
    append_session_index(&repo_root, &session_id, selected_provider.as_str(), &model);

    let tool_ctx = Arc::new(ToolContext {
        repo_root: repo_root.clone(),
        workspace,
        approvals: Arc::new(TerminalApprovalArbitrator::new()),
    });

    let options = AgentOptions {
        repo_root: repo_root.clone(),
        model: model.clone(),
        ..Default::default()
    };

    let orchestrator = Orchestrator::new(
        options,
        adapter,
        Arc::new(ToolRegistry::with_default_tools()),
        PolicyEngine::new(args.auto_approve),
        tool_ctx,
        Some(log),
        Arc::new(TerminalUiSink::new()),
    );

    println!(
        "relay session {session_id} — workspace={} provider={} model={model}",
        repo_root.display(),
        selected_provider.as_str(),
    );
    println!("Type /help for commands, /exit or /quit to leave.");

    repl(&orchestrator, &mut messages).await;
    Ok(())
}

async fn repl(orchestrator: &Orchestrator, messages: &mut Vec<Message>) {
    loop {
        print!("> ");
        {
            use std::io::Write;
            std::io::stdout().flush().ok();
        }

        let line = match read_line().await {
            Some(l) => l,
            None => break,
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "/exit" | "/quit" => break,
            "/help" => {
                println!("Commands: /exit, /quit (end the session), /help (show this message).");
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
            })
        };

        if let Err(e) = orchestrator.run(trimmed, messages, cancel).await {
            eprintln!("[Error] {e}");
        }
        watcher.abort();
    }
}

async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}

/// Appends one record to `<repo_root>/.agent/sessions.jsonl` for this
/// create/resume, per the session index contract.
fn append_session_index(repo_root: &std::path::Path, id: &str, provider: &str, model: &str) {
    let path = sessions_index_path(repo_root);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let record = serde_json::json!({
        "id": id,
        "provider": provider,
        "model": model,
        "createdAt": chrono::Utc::now().to_rfc3339(),
    });
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut file) => {
            use std::io::Write;
            if writeln!(file, "{record}").is_err() {
                tracing::warn!(path = %path.display(), "failed to write session index entry");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to open session index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_defaults() {
        let args = Args::parse_from(["relay"]);
        assert_eq!(args.workspace, PathBuf::from("."));
        assert!(args.provider.is_none());
        assert!(!args.auto_approve);
        assert_eq!(args.log_level, "info");
        assert!(args.command.is_none());
    }

    #[test]
    fn args_parse_serve_subcommand() {
        let args = Args::parse_from(["relay", "serve", "--addr", "0.0.0.0:9000"]);
        match args.command {
            Some(Command::Serve(serve_args)) => {
                assert_eq!(serve_args.addr.as_deref(), Some("0.0.0.0:9000"));
            }
            _ => panic!("expected Command::Serve"),
        }
    }

    #[test]
    fn args_parse_overrides() {
        let args = Args::parse_from([
            "relay",
            "--workspace",
            "/tmp/repo",
            "--provider",
            "anthropic",
            "--model",
            "claude-opus",
            "--session",
            "abc123",
            "--auto-approve",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.workspace, PathBuf::from("/tmp/repo"));
        assert_eq!(args.provider.as_deref(), Some("anthropic"));
        assert_eq!(args.model.as_deref(), Some("claude-opus"));
        assert_eq!(args.session.as_deref(), Some("abc123"));
        assert!(args.auto_approve);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn append_session_index_writes_one_line_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        append_session_index(tmp.path(), "s1", "openai", "gpt-4o");
        append_session_index(tmp.path(), "s2", "anthropic", "claude-sonnet-4-20250514");

        let content = std::fs::read_to_string(sessions_index_path(tmp.path())).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "s1");
        assert_eq!(first["provider"], "openai");
    }
}
