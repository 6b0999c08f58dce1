//! Axum app: state, router, and the session endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServeError;
use crate::session::{build_runtime, resume_messages, CreateSessionRequest, SessionStore};

pub struct AppState {
    pub store: SessionStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/resume", post(resume_session))
        .route("/api/sessions/:id/chat", post(chat))
        .route("/api/sessions/:id/approvals/:call_id", post(approve))
        .route("/api/sessions/:id/stream", get(stream))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServeError> {
    let id = uuid::Uuid::new_v4().to_string();
    let runtime = build_runtime(&id, request, Vec::new())?;
    state.store.insert(id.clone(), Arc::new(runtime));
    Ok(Json(CreateSessionResponse { session_id: id }))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<engine::session::SessionInfo>, ServeError> {
    let runtime = state
        .store
        .try_get(&id)
        .ok_or_else(|| ServeError::NotFound(format!("unknown session: {id}")))?;
    Ok(Json(runtime.info.clone()))
}

async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServeError> {
    let messages = resume_messages(&request.workspace_path, &id)?;
    let runtime = build_runtime(&id, request, messages)?;
    state.store.insert(id.clone(), Arc::new(runtime));
    Ok(Json(CreateSessionResponse { session_id: id }))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<axum::http::StatusCode, ServeError> {
    if request.message.trim().is_empty() {
        return Err(ServeError::Validation("message must not be empty".to_string()));
    }
    let runtime = state
        .store
        .try_get(&id)
        .ok_or_else(|| ServeError::NotFound(format!("unknown session: {id}")))?;

    let session_id = id.clone();
    tokio::spawn(async move {
        if let Err(err) = runtime.chat(request.message).await {
            tracing::warn!(session = %session_id, error = %err, "session turn failed");
        }
    });

    Ok(axum::http::StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct ApproveRequest {
    approved: bool,
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Path((id, call_id)): Path<(String, String)>,
    Json(request): Json<ApproveRequest>,
) -> Result<axum::http::StatusCode, ServeError> {
    let runtime = state
        .store
        .try_get(&id)
        .ok_or_else(|| ServeError::NotFound(format!("unknown session: {id}")))?;
    if runtime.resolve_approval(&call_id, request.approved) {
        Ok(axum::http::StatusCode::OK)
    } else {
        Err(ServeError::NotFound(format!("no pending approval: {call_id}")))
    }
}

async fn stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServeError> {
    let runtime = state
        .store
        .try_get(&id)
        .ok_or_else(|| ServeError::NotFound(format!("unknown session: {id}")))?;
    let guard = runtime
        .try_acquire_stream()
        .ok_or_else(|| ServeError::Conflict("a stream is already connected for this session".to_string()))?;

    let events = futures::stream::unfold(guard, |mut guard| async move {
        let event = guard.recv().await?;
        let sse = Event::default()
            .event(event.event_name())
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().event("error").data("event serialization failed"));
        Some((Ok(sse), guard))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
