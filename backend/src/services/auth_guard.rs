//! Request-time authentication: a signed token plus the live session it names.
//!
//! A token only authenticates while its slot is active, its hash is the one
//! currently bound to the slot, and the request comes from the same address
//! and user agent that logged in. Every failure is reported to the client as
//! the same 401; the variant is for logs only.

use thiserror::Error;

use crate::{
    models::session::{Session, SlotId},
    services::session_pool::SessionPool,
    utils::jwt::{token_hash, validate_token, Claims},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Where a request comes from, in stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin {
    pub fingerprint: u32,
    pub user_agent: String,
}

/// Identity handed to downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub username: String,
    pub slot_id: SlotId,
    pub claims: Claims,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("missing token")]
    MissingToken,
    #[error("client origin cannot be fingerprinted")]
    UnknownOrigin,
    #[error("token failed validation")]
    InvalidToken,
    #[error("token outside its validity window")]
    Expired,
    #[error("token names a slot outside the pool")]
    InvalidSlot,
    #[error("session is not active")]
    InactiveSession,
    #[error("token has been superseded")]
    Superseded,
    #[error("client address changed")]
    FingerprintMismatch,
    #[error("user agent changed")]
    UserAgentMismatch,
}

pub fn authenticate(
    pool: &SessionPool,
    secret: &str,
    token: &str,
    kind: TokenKind,
    origin: &ClientOrigin,
) -> Result<AuthContext, GuardError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(GuardError::MissingToken);
    }

    let claims = validate_token(token, secret).map_err(|_| GuardError::InvalidToken)?;
    if !claims.is_active_at(pool.now()) {
        return Err(GuardError::Expired);
    }

    let session = pool
        .get(usize::from(claims.session_id))
        .map_err(|_| GuardError::InvalidSlot)?;
    if !session.active {
        return Err(GuardError::InactiveSession);
    }
    if bound_hash(&session, kind) != token_hash(token) {
        return Err(GuardError::Superseded);
    }
    if session.client_fingerprint != origin.fingerprint {
        return Err(GuardError::FingerprintMismatch);
    }
    if session.user_agent != origin.user_agent {
        return Err(GuardError::UserAgentMismatch);
    }

    Ok(AuthContext {
        username: claims.username.clone(),
        slot_id: claims.session_id,
        claims,
    })
}

fn bound_hash(session: &Session, kind: TokenKind) -> u64 {
    match kind {
        TokenKind::Access => session.access_token_hash,
        TokenKind::Refresh => session.refresh_token_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::session::{SessionGrant, TokenBinding},
        utils::{
            jwt::{issue_token_pair, TokenLifetimes, TokenPair},
            time::{Clock, ManualClock},
        },
    };
    use std::sync::Arc;

    const SECRET: &str = "guard-test-secret-0123456789";
    const T0: u32 = 1_700_000_000;

    fn origin() -> ClientOrigin {
        ClientOrigin {
            fingerprint: 0xC0A8_0001,
            user_agent: "agent/1.0".into(),
        }
    }

    fn login(pool: &SessionPool, clock: &ManualClock) -> TokenPair {
        let lifetimes = TokenLifetimes::new(15, 7);
        let slot = pool
            .allocate(SessionGrant {
                client_fingerprint: origin().fingerprint,
                user_agent: origin().user_agent,
                subject: "alice".into(),
                expires_at: clock.now() + lifetimes.refresh.as_secs() as u32,
            })
            .unwrap();
        let pair = issue_token_pair(slot, "alice", SECRET, clock.now(), lifetimes).unwrap();
        pool.bind_tokens(
            usize::from(slot),
            TokenBinding {
                access_token_hash: token_hash(&pair.access_token),
                refresh_token_hash: token_hash(&pair.refresh_token),
                expires_at: pair.refresh_expires_at as u32,
            },
        )
        .unwrap();
        pair
    }

    fn setup() -> (SessionPool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (SessionPool::new(4, clock.clone()).unwrap(), clock)
    }

    #[test]
    fn accepts_bound_token_from_same_origin() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);
        let ctx = authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &origin())
            .expect("authenticated");
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.slot_id, 0);
        assert_eq!(ctx.claims.session_id, 0);
    }

    #[test]
    fn rejects_missing_and_forged_tokens() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);
        assert_eq!(
            authenticate(&pool, SECRET, "  ", TokenKind::Access, &origin()).unwrap_err(),
            GuardError::MissingToken
        );
        assert_eq!(
            authenticate(&pool, "other-secret-0123456789", &pair.access_token, TokenKind::Access, &origin())
                .unwrap_err(),
            GuardError::InvalidToken
        );
    }

    #[test]
    fn rejects_expired_access_token() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);
        clock.advance(15 * 60 + 1);
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &origin()).unwrap_err(),
            GuardError::Expired
        );
        assert!(authenticate(&pool, SECRET, &pair.refresh_token, TokenKind::Refresh, &origin()).is_ok());
    }

    #[test]
    fn rejects_after_logout() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);
        pool.disable(0).unwrap();
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &origin()).unwrap_err(),
            GuardError::InactiveSession
        );
    }

    #[test]
    fn rejects_superseded_token_that_still_validates() {
        let (pool, clock) = setup();
        let old = login(&pool, &clock);
        let new = issue_token_pair(0, "alice", SECRET, clock.now(), TokenLifetimes::new(15, 7)).unwrap();
        pool.rotate_tokens(
            0,
            token_hash(&old.refresh_token),
            TokenBinding {
                access_token_hash: token_hash(&new.access_token),
                refresh_token_hash: token_hash(&new.refresh_token),
                expires_at: new.refresh_expires_at as u32,
            },
        )
        .unwrap();

        assert!(validate_token(&old.access_token, SECRET).is_ok());
        assert_eq!(
            authenticate(&pool, SECRET, &old.access_token, TokenKind::Access, &origin()).unwrap_err(),
            GuardError::Superseded
        );
        assert!(authenticate(&pool, SECRET, &new.access_token, TokenKind::Access, &origin()).is_ok());
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Refresh, &origin()).unwrap_err(),
            GuardError::Superseded
        );
    }

    #[test]
    fn rejects_changed_address_or_user_agent() {
        let (pool, clock) = setup();
        let pair = login(&pool, &clock);

        let moved = ClientOrigin {
            fingerprint: 0xC0A8_0002,
            ..origin()
        };
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &moved).unwrap_err(),
            GuardError::FingerprintMismatch
        );

        let other_agent = ClientOrigin {
            user_agent: "agent/2.0".into(),
            ..origin()
        };
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &other_agent).unwrap_err(),
            GuardError::UserAgentMismatch
        );
    }

    #[test]
    fn rejects_slot_beyond_capacity() {
        let (pool, clock) = setup();
        let pair = issue_token_pair(9, "alice", SECRET, clock.now(), TokenLifetimes::new(15, 7)).unwrap();
        assert_eq!(
            authenticate(&pool, SECRET, &pair.access_token, TokenKind::Access, &origin()).unwrap_err(),
            GuardError::InvalidSlot
        );
    }
}
