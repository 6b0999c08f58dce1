//! HTTP + SSE server exposing agent sessions over the engine.
//!
//! One session runtime per `POST /api/sessions`, each driving its own
//! [`engine::Orchestrator`] with a [`engine::orchestrator::ChannelUiSink`] and
//! [`engine::approval::ServerApprovalArbitrator`] so the turn loop is shared
//! verbatim with the terminal CLI surface.

mod app;
mod error;
mod provider;
mod session;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use app::{router, AppState};

pub use error::ServeError;
pub use session::{CreateSessionRequest, SessionRuntime, SessionStore};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Runs the server on an existing listener. Used by tests (bind to
/// `127.0.0.1:0`, then pass the listener in to read back the bound port).
pub async fn run_serve_on_listener(
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("HTTP server listening on http://{addr}");

    let state = Arc::new(AppState {
        store: SessionStore::new(),
    });
    let app = router(state);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the server, binding `addr` (default `127.0.0.1:8080`).
pub async fn run_serve(addr: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener).await
}
