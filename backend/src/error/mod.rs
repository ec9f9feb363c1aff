use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    services::{credentials::CredentialError, session_pool::PoolError},
    utils::jwt::TokenError,
};

/// Single message for every authentication failure.
pub const UNAUTHENTICATED_MESSAGE: &str = "Authentication required";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    BadRequest(String),
    TooManySessions,
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl AppError {
    pub fn unauthenticated() -> Self {
        AppError::Unauthorized(UNAUTHENTICATED_MESSAGE.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND", None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED", None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", None),
            AppError::TooManySessions => (
                StatusCode::TOO_MANY_REQUESTS,
                PoolError::PoolExhausted.to_string(),
                "TOO_MANY_SESSIONS",
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::PoolExhausted => AppError::TooManySessions,
            PoolError::InvalidId(_) => AppError::BadRequest(err.to_string()),
            PoolError::NotFound(_) => AppError::NotFound("Session not found".to_string()),
            PoolError::Superseded(_) => AppError::unauthenticated(),
            PoolError::InvalidCapacity { .. } | PoolError::SnapshotMismatch { .. } => {
                AppError::InternalServerError(err.into())
            }
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredentials => {
                AppError::Unauthorized("Invalid username or password".to_string())
            }
            CredentialError::Hash(_) => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => AppError::InternalServerError(err.into()),
            TokenError::Invalid(_) | TokenError::Expired | TokenError::NotYetValid => {
                AppError::unauthenticated()
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
