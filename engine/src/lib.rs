//! Core agent engine: orchestration loop, normalized provider adapters, tool
//! pipeline, workspace safety, and session persistence.
//!
//! This crate implements the bounded reasoning loop that drives a model
//! through text and tool-call turns against a developer's repository, and
//! the pieces it is built from:
//!
//! - [`workspace`]: path containment (`WorkspaceGuard`).
//! - [`message`]: the conversation data model (`Message`, `ToolCall`, `ToolResult`).
//! - [`tool`]: tool contract, registry, policy engine, and the concrete tool set.
//! - [`approval`]: approval arbitration (terminal and server-side).
//! - [`provider`]: normalized event stream and the OpenAI / Anthropic / OpenAI-compatible adapters.
//! - [`orchestrator`]: the turn loop itself.
//! - [`session`]: append-only session log writer and reader.
//! - [`error`]: the shared error taxonomy.

pub mod approval;
pub mod error;
pub mod event;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod tool;
pub mod workspace;

pub use error::AgentError;
pub use event::ServerEvent;
pub use message::{Diagnostic, Message, ToolCall, ToolResult};
pub use orchestrator::{AgentOptions, Orchestrator, UiSink};
pub use workspace::WorkspaceGuard;
