use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::{
    error::AppError,
    models::auth::{MessageResponse, SessionResponse},
    services::auth_guard::AuthContext,
    state::AppState,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Json<Vec<SessionResponse>> {
    let sessions = state
        .sessions
        .list_active()
        .into_iter()
        .filter(|view| view.subject == context.username)
        .map(|view| SessionResponse {
            is_current: view.slot_id == context.slot_id,
            session: view,
        })
        .collect();
    Json(sessions)
}

pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let slot_id: usize = session_id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest("Session ID must be a slot number".into()))?;

    if slot_id == usize::from(context.slot_id) {
        return Err(AppError::BadRequest(
            "Cannot revoke current session; use logout instead".into(),
        ));
    }

    if !state.sessions.disable_owned(slot_id, &context.username)? {
        return Err(AppError::NotFound("Session not found".into()));
    }
    tracing::info!(username = %context.username, slot_id, "session revoked");
    Ok(Json(MessageResponse::new(format!("Session {} revoked", slot_id))))
}
