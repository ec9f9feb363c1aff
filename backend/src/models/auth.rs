use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    models::session::{SessionView, SlotId},
    utils::{jwt::TokenPair, time::to_datetime},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 1024))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
    pub session_id: SlotId,
}

impl TokenResponse {
    pub fn new(pair: TokenPair, session_id: SlotId) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
            session_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub username: String,
    pub session_id: SlotId,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: SessionView,
    pub is_current: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// First frame sent on the stream endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamHello {
    pub username: String,
    pub session_id: SlotId,
    pub expires_at: DateTime<Utc>,
}

impl StreamHello {
    pub fn new(username: String, session_id: SlotId, expires_at: u32) -> Self {
        Self {
            username,
            session_id,
            expires_at: to_datetime(expires_at),
        }
    }
}
