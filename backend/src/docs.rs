#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::models::{
    auth::{
        ChangePasswordRequest, LoginRequest, MeResponse, MessageResponse, RefreshRequest,
        SessionResponse, TokenResponse,
    },
    session::SessionView,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_doc,
        refresh_doc,
        logout_doc,
        change_password_doc,
        me_doc,
        list_sessions_doc,
        revoke_session_doc,
        stream_doc
    ),
    components(
        schemas(
            LoginRequest,
            RefreshRequest,
            ChangePasswordRequest,
            TokenResponse,
            MeResponse,
            MessageResponse,
            SessionView,
            SessionResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Login, token refresh, logout and password change"),
        (name = "Sessions", description = "Session slots held by the current user"),
        (name = "Stream", description = "Authenticated WebSocket stream")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session slot allocated", body = TokenResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 429, description = "Every session slot is in use")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 401, description = "Refresh token rejected")
    ),
    tag = "Auth",
    security(())
)]
fn refresh_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, body = MessageResponse)),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; every session revoked", body = MessageResponse),
        (status = 401, description = "Current password is incorrect")
    ),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, body = MeResponse)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses((status = 200, body = [SessionResponse])),
    tag = "Sessions"
)]
fn list_sessions_doc() {}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session slot number")),
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "Malformed id or the current session"),
        (status = 404, description = "No such session for this user")
    ),
    tag = "Sessions"
)]
fn revoke_session_doc() {}

#[utoipa::path(
    get,
    path = "/api/stream",
    params(("token" = String, Query, description = "Access token")),
    responses(
        (status = 101, description = "WebSocket upgrade"),
        (status = 401, description = "Token rejected")
    ),
    tag = "Stream",
    security(())
)]
fn stream_doc() {}
