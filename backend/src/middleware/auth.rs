use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::{
    services::auth_guard::{authenticate, ClientOrigin, GuardError, TokenKind},
    state::AppState,
    utils::request::client_origin,
};

/// Query string of streaming routes; `token` carries the access token.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub token: Option<String>,
}

/// Header-based guard for ordinary API routes.
pub async fn auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(str::to_owned);
    guard(state, token, request, next).await
}

/// Query-based guard for connections that cannot set headers (WebSocket upgrades).
pub async fn auth_stream(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_query_token(request.uri());
    guard(state, token, request, next).await
}

async fn guard(
    state: AppState,
    token: Option<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let outcome = token.ok_or(GuardError::MissingToken).and_then(|token| {
        let origin = request_origin(&state, request.headers(), peer_addr(&request))?;
        authenticate(
            &state.sessions,
            state.jwt_secret(),
            &token,
            TokenKind::Access,
            &origin,
        )
    });

    match outcome {
        Ok(context) => {
            request.extensions_mut().insert(context);
            Ok(next.run(request).await)
        }
        Err(reason) => {
            tracing::debug!(%reason, path = %request.uri().path(), "rejected request");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub(crate) fn request_origin(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Result<ClientOrigin, GuardError> {
    client_origin(headers, peer, state.config.trust_proxy_headers)
        .map_err(|_| GuardError::UnknownOrigin)
}

pub(crate) fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

pub fn extract_query_token(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<StreamQuery>::try_from_uri(uri).ok()?;
    query.token.filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER   abc "), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("abc"), None);
    }

    fn query_token(uri: &str) -> Option<String> {
        extract_query_token(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn query_token_is_found_among_other_params() {
        assert_eq!(query_token("/api/stream?token=abc").as_deref(), Some("abc"));
        assert_eq!(
            query_token("/api/stream?x=1&token=a.b.c&y=2").as_deref(),
            Some("a.b.c")
        );
        assert_eq!(query_token("/api/stream?tokens=abc"), None);
        assert_eq!(query_token("/api/stream?token="), None);
        assert_eq!(query_token("/api/stream"), None);
    }

    #[test]
    fn query_token_is_percent_decoded() {
        assert_eq!(
            query_token("/api/stream?token=aaa%2Ebbb%2Eccc").as_deref(),
            Some("aaa.bbb.ccc")
        );
    }
}
