use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::session::SlotId;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sid")]
    pub session_id: SlotId,
    #[serde(rename = "sub")]
    pub username: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64, // expiration time
    pub jti: String,
}

impl Claims {
    pub fn new(session_id: SlotId, username: String, issued_at: u32, lifetime: Duration) -> Self {
        let iat = i64::from(issued_at);
        Self {
            session_id,
            username,
            iat,
            nbf: iat,
            exp: iat.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired_at(&self, now: u32) -> bool {
        i64::from(now) > self.exp
    }

    pub fn is_active_at(&self, now: u32) -> bool {
        let now = i64::from(now);
        self.nbf <= now && now <= self.exp
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn new(access_minutes: u64, refresh_days: u64) -> Self {
        Self {
            access: Duration::from_secs(access_minutes.saturating_mul(60)),
            refresh: Duration::from_secs(refresh_days.saturating_mul(24 * 60 * 60)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

fn sign(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Signing("signing secret is empty".into()));
    }
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Mints an access/refresh pair bound to `session_id`. Each token gets its own `jti`.
pub fn issue_token_pair(
    session_id: SlotId,
    username: &str,
    secret: &str,
    issued_at: u32,
    lifetimes: TokenLifetimes,
) -> Result<TokenPair, TokenError> {
    let access = Claims::new(session_id, username.to_string(), issued_at, lifetimes.access);
    let refresh = Claims::new(session_id, username.to_string(), issued_at, lifetimes.refresh);

    Ok(TokenPair {
        access_token: sign(&access, secret)?,
        refresh_token: sign(&refresh, secret)?,
        access_expires_at: access.exp,
        refresh_expires_at: refresh.exp,
    })
}

/// Checks signature and structure only.
///
/// `exp` and `nbf` are NOT enforced here: time is judged against the injected
/// clock by the caller (see [`Claims::is_active_at`]), or use
/// [`validate_unexpired_token`] which does both steps.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map_err(TokenError::Invalid)?;

    Ok(token_data.claims)
}

pub fn validate_unexpired_token(token: &str, secret: &str, now: u32) -> Result<Claims, TokenError> {
    let claims = validate_token(token, secret)?;
    if claims.is_expired_at(now) {
        return Err(TokenError::Expired);
    }
    if !claims.is_active_at(now) {
        return Err(TokenError::NotYetValid);
    }
    Ok(claims)
}

/// 64-bit fingerprint of a token string, stored on the session in place of the token.
pub fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}
