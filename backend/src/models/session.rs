//! Models for the bounded session slot array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::{fingerprint, time::to_datetime};

/// Slot index; the narrowest integer that addresses every slot.
pub type SlotId = u8;

/// Largest pool a [`SlotId`] can address.
pub const MAX_SLOTS: usize = SlotId::MAX as usize + 1;

/// One fixed-position record in the session pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub active: bool,
    /// Encoded IPv4 address of the client that logged in.
    pub client_fingerprint: u32,
    pub user_agent: String,
    /// Subject identity the slot was issued to.
    pub subject: String,
    /// Unix seconds; zero means the slot has never been used.
    pub created_at: u32,
    pub last_access_at: u32,
    pub expires_at: u32,
    pub access_token_hash: u64,
    pub refresh_token_hash: u64,
}

impl Session {
    pub fn is_used(&self) -> bool {
        self.created_at != 0
    }

    /// Active but past its expiry, i.e. due to be swept.
    pub fn is_stale_at(&self, now: u32) -> bool {
        self.active && now > self.expires_at
    }
}

/// What login hands the pool when claiming a slot.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub client_fingerprint: u32,
    pub user_agent: String,
    pub subject: String,
    pub expires_at: u32,
}

/// Token hashes and expiry written onto an active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBinding {
    pub access_token_hash: u64,
    pub refresh_token_hash: u64,
    pub expires_at: u32,
}

/// Decoded, display-friendly copy of a used slot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub slot_id: SlotId,
    pub active: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionView {
    pub fn from_slot(slot_id: SlotId, session: &Session) -> Self {
        Self {
            slot_id,
            active: session.active,
            client_ip: fingerprint::decode(session.client_fingerprint),
            user_agent: session.user_agent.clone(),
            subject: session.subject.clone(),
            created_at: to_datetime(session.created_at),
            last_access_at: to_datetime(session.last_access_at),
            expires_at: to_datetime(session.expires_at),
        }
    }
}
