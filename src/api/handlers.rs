//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ChatRequest, ErrorResponse, SessionResponse, SuccessResponse, UploadRequest};
use super::AppState;
use crate::dispute::DisputeFieldsUpdate;
use crate::document::UploadedFile;
use crate::runtime::{Action, SessionError, SessionHandle};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/close", post(close_session))
        .route("/api/sessions/:id/reset", post(reset_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // Document and chat
        .route("/api/sessions/:id/document", post(upload_document))
        .route("/api/sessions/:id/chat", post(send_chat))
        // Dispute workflow
        .route("/api/sessions/:id/dispute", post(update_dispute))
        .route("/api/sessions/:id/dispute/draft", post(request_draft))
        .route("/api/sessions/:id/dispute/send", post(confirm_send))
        .route("/api/sessions/:id/dispute/cancel", post(cancel_dispute))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lookup
// ============================================================

async fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

/// One action at a time per session; a second one is refused, not queued
async fn perform(state: &AppState, id: &str, action: Action) -> Result<SessionResponse, AppError> {
    let session = lookup(state, id).await?.perform(action).await?;
    Ok(SessionResponse {
        id: id.to_string(),
        session,
    })
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let (id, handle) = state.sessions.create().await;
    Json(SessionResponse {
        id,
        session: handle.latest(),
    })
}

/// Reads the last published snapshot, so it answers while a call is in flight
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = lookup(&state, &id).await?;
    Ok(Json(SessionResponse {
        session: handle.latest(),
        id,
    }))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.close(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

/// Waits for any in-flight call to finish, then clears the session
async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = lookup(&state, &id).await?.reset().await?;
    Ok(Json(SessionResponse { id, session }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = lookup(&state, &id).await?;
    // Subscribe first so no update falls between the snapshot and the stream
    let broadcast_rx = handle.subscribe();
    Ok(sse_stream(handle.latest(), broadcast_rx))
}

// ============================================================
// Document and Chat
// ============================================================

async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let upload = decode_upload(req, state.max_upload_bytes)?;
    perform(&state, &id, Action::UploadDocument(upload))
        .await
        .map(Json)
}

fn decode_upload(req: UploadRequest, max_bytes: usize) -> Result<UploadedFile, AppError> {
    let file_name = req.file_name.trim();
    if !has_pdf_extension(file_name) {
        return Err(AppError::BadRequest(
            "Only PDF documents are accepted".to_string(),
        ));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.data.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid file data: {e}")))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("The uploaded file is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::BadRequest(format!(
            "The uploaded file exceeds {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(UploadedFile::new(file_name, bytes))
}

fn has_pdf_extension(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    perform(&state, &id, Action::SendMessage(req.text))
        .await
        .map(Json)
}

// ============================================================
// Dispute Workflow
// ============================================================

async fn update_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<DisputeFieldsUpdate>,
) -> Result<Json<SessionResponse>, AppError> {
    perform(&state, &id, Action::UpdateDispute(update))
        .await
        .map(Json)
}

async fn request_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    perform(&state, &id, Action::RequestDraft).await.map(Json)
}

async fn confirm_send(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    perform(&state, &id, Action::ConfirmSend).await.map(Json)
}

async fn cancel_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    perform(&state, &id, Action::CancelDispute).await.map(Json)
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("credit_rep_chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Rejected(TransitionError::EmptyMessage) => {
                AppError::BadRequest(error.to_string())
            }
            SessionError::Rejected(_) => AppError::Conflict(error.to_string()),
            SessionError::Failed(_) => AppError::BadGateway(error.to_string()),
            SessionError::Interrupted(_) => AppError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
