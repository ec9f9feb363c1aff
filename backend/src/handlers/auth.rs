use axum::{
    extract::{Extension, FromRequest, Request, State},
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::{peer_addr, request_origin},
    models::{
        auth::{
            ChangePasswordRequest, LoginRequest, MeResponse, MessageResponse, RefreshRequest,
            TokenResponse,
        },
        session::{SessionGrant, TokenBinding},
    },
    services::auth_guard::{authenticate, AuthContext, TokenKind},
    state::AppState,
    utils::{
        jwt::{issue_token_pair, token_hash, TokenPair},
        time::to_datetime,
    },
};

/// Reads the JSON body after the origin has been taken from the request parts.
async fn json_body<T>(request: Request, state: &AppState) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned + Validate,
{
    let Json(payload) = Json::<T>::from_request(request, state)
        .await
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    payload.validate()?;
    Ok(payload)
}

pub async fn login(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<TokenResponse>, AppError> {
    let origin = request_origin(&state, request.headers(), peer_addr(&request))
        .map_err(|_| AppError::BadRequest("Client address cannot be identified".into()))?;
    let payload: LoginRequest = json_body(request, &state).await?;

    state
        .credentials
        .verify(&payload.username, &payload.password)
        .await
        .inspect_err(|_| tracing::info!(username = %payload.username, "login rejected"))?;

    let lifetimes = state.token_lifetimes();
    let now = state.sessions.now();
    let expires_at = u32::try_from(lifetimes.refresh.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| anyhow::anyhow!("refresh lifetime does not fit the session clock"))?;
    let slot_id = state.sessions.allocate(SessionGrant {
        client_fingerprint: origin.fingerprint,
        user_agent: origin.user_agent,
        subject: payload.username.clone(),
        expires_at,
    })?;

    let pair = match issue_token_pair(slot_id, &payload.username, state.jwt_secret(), now, lifetimes)
    {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, slot_id, "token signing failed; check JWT_SECRET");
            let _ = state.sessions.disable(usize::from(slot_id));
            return Err(err.into());
        }
    };
    state
        .sessions
        .bind_tokens(usize::from(slot_id), binding_for(&pair))?;

    tracing::info!(username = %payload.username, slot_id, "login succeeded");
    Ok(Json(TokenResponse::new(pair, slot_id)))
}

pub async fn refresh(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<TokenResponse>, AppError> {
    let origin = request_origin(&state, request.headers(), peer_addr(&request));
    let payload: RefreshRequest = json_body(request, &state).await?;

    let context = origin
        .and_then(|origin| {
            authenticate(
                &state.sessions,
                state.jwt_secret(),
                &payload.refresh_token,
                TokenKind::Refresh,
                &origin,
            )
        })
        .map_err(|reason| {
            tracing::debug!(%reason, "refresh rejected");
            AppError::unauthenticated()
        })?;

    let pair = issue_token_pair(
        context.slot_id,
        &context.username,
        state.jwt_secret(),
        state.sessions.now(),
        state.token_lifetimes(),
    )
    .inspect_err(|err| tracing::error!(error = %err, "token signing failed; check JWT_SECRET"))?;

    state.sessions.rotate_tokens(
        usize::from(context.slot_id),
        token_hash(payload.refresh_token.trim()),
        binding_for(&pair),
    )?;

    Ok(Json(TokenResponse::new(pair, context.slot_id)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.disable(usize::from(context.slot_id))?;
    tracing::info!(username = %context.username, slot_id = context.slot_id, "logged out");
    Ok(Json(MessageResponse::new("Logged out")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    if payload.new_password == payload.current_password {
        return Err(AppError::BadRequest(
            "New password must differ from current password".into(),
        ));
    }

    state
        .credentials
        .change_password(
            &context.username,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    let revoked = state.sessions.disable_all();
    tracing::info!(username = %context.username, revoked, "password changed; all sessions revoked");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

pub async fn me(Extension(context): Extension<AuthContext>) -> Json<MeResponse> {
    Json(MeResponse {
        username: context.username,
        session_id: context.slot_id,
        token_expires_at: to_datetime(u32::try_from(context.claims.exp).unwrap_or(u32::MAX)),
    })
}

fn binding_for(pair: &TokenPair) -> TokenBinding {
    TokenBinding {
        access_token_hash: token_hash(&pair.access_token),
        refresh_token_hash: token_hash(&pair.refresh_token),
        expires_at: u32::try_from(pair.refresh_expires_at).unwrap_or(u32::MAX),
    }
}
