//! Fixed-capacity session registry.
//!
//! Slots live in one `RwLock<Vec<Session>>` whose length never changes after
//! construction. Expiry is lazy: every staleness-sensitive operation first
//! flips `active` off for slots with `now > expires_at`. Allocation scans and
//! claims under a single write guard so two logins can never receive the same
//! slot.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::{
    models::session::{Session, SessionGrant, SessionView, SlotId, TokenBinding, MAX_SLOTS},
    utils::time::Clock,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("session id {0} is out of range")]
    InvalidId(usize),
    #[error("session {0} is not active")]
    NotFound(SlotId),
    #[error("too many concurrent sessions, log out elsewhere")]
    PoolExhausted,
    #[error("session {0} was refreshed by another request")]
    Superseded(SlotId),
    #[error("session capacity must be between 1 and {max}, got {got}")]
    InvalidCapacity { got: usize, max: usize },
    #[error("snapshot holds {got} slots but the pool has {expected}")]
    SnapshotMismatch { expected: usize, got: usize },
}

pub struct SessionPool {
    slots: RwLock<Vec<Session>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self, PoolError> {
        if capacity == 0 || capacity > MAX_SLOTS {
            return Err(PoolError::InvalidCapacity {
                got: capacity,
                max: MAX_SLOTS,
            });
        }
        Ok(Self {
            slots: RwLock::new(vec![Session::default(); capacity]),
            clock,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    /// Claims the first never-used slot, else the oldest inactive one.
    ///
    /// The claimed slot is overwritten with the grant and marked active before
    /// the lock is released; token hashes stay zero until [`Self::bind_tokens`].
    pub fn allocate(&self, grant: SessionGrant) -> Result<SlotId, PoolError> {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now);

        let index = select_slot(&slots).ok_or(PoolError::PoolExhausted)?;
        slots[index] = Session {
            active: true,
            client_fingerprint: grant.client_fingerprint,
            user_agent: grant.user_agent,
            subject: grant.subject,
            created_at: now,
            last_access_at: now,
            expires_at: grant.expires_at,
            access_token_hash: 0,
            refresh_token_hash: 0,
        };

        let slot_id = index as SlotId;
        tracing::debug!(slot_id, "allocated session slot");
        Ok(slot_id)
    }

    /// Stores freshly issued token hashes on an active slot.
    pub fn bind_tokens(&self, slot_id: usize, binding: TokenBinding) -> Result<(), PoolError> {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now);

        let session = active_slot_mut(&mut slots, slot_id)?;
        apply_binding(session, binding, now);
        Ok(())
    }

    /// Replaces the token hashes only if the refresh hash still matches
    /// `expected_refresh_hash`. Origin fields and `created_at` are untouched.
    pub fn rotate_tokens(
        &self,
        slot_id: usize,
        expected_refresh_hash: u64,
        binding: TokenBinding,
    ) -> Result<(), PoolError> {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now);

        let session = active_slot_mut(&mut slots, slot_id)?;
        if session.refresh_token_hash != expected_refresh_hash {
            return Err(PoolError::Superseded(slot_id as SlotId));
        }
        apply_binding(session, binding, now);
        Ok(())
    }

    /// Snapshot of one slot, active or not.
    pub fn get(&self, slot_id: usize) -> Result<Session, PoolError> {
        let slots = self.read_swept();
        slots
            .get(slot_id)
            .cloned()
            .ok_or(PoolError::InvalidId(slot_id))
    }

    pub fn disable(&self, slot_id: usize) -> Result<(), PoolError> {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now);

        let session = slots
            .get_mut(slot_id)
            .ok_or(PoolError::InvalidId(slot_id))?;
        session.active = false;
        Ok(())
    }

    /// Deactivates the slot only if it has been used by `subject`, checking and
    /// writing under one guard. `Ok(false)` means unused or held by someone else.
    pub fn disable_owned(&self, slot_id: usize, subject: &str) -> Result<bool, PoolError> {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now);

        let session = slots
            .get_mut(slot_id)
            .ok_or(PoolError::InvalidId(slot_id))?;
        if !session.is_used() || session.subject != subject {
            return Ok(false);
        }
        session.active = false;
        Ok(true)
    }

    /// Deactivates every slot, returning how many were active.
    pub fn disable_all(&self) -> usize {
        let mut slots = self.slots.write();
        let mut disabled = 0;
        for session in slots.iter_mut().filter(|s| s.active) {
            session.active = false;
            disabled += 1;
        }
        disabled
    }

    /// Every slot that has ever been used, including inactive ones.
    pub fn list_active(&self) -> Vec<SessionView> {
        let slots = self.read_swept();
        slots
            .iter()
            .enumerate()
            .filter(|(_, session)| session.is_used())
            .map(|(index, session)| SessionView::from_slot(index as SlotId, session))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.read_swept().iter().filter(|s| s.active).count()
    }

    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.write();
        expire_stale(&mut slots, now)
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.read_swept().clone()
    }

    /// Replaces the whole array; `slots` must match the pool capacity.
    pub fn restore(&self, slots: Vec<Session>) -> Result<(), PoolError> {
        let mut current = self.slots.write();
        if slots.len() != current.len() {
            return Err(PoolError::SnapshotMismatch {
                expected: current.len(),
                got: slots.len(),
            });
        }
        *current = slots;
        Ok(())
    }

    /// Shared guard over the slots, sweeping first if anything is stale.
    fn read_swept(&self) -> RwLockReadGuard<'_, Vec<Session>> {
        let now = self.clock.now();
        let slots = self.slots.upgradable_read();
        if !slots.iter().any(|s| s.is_stale_at(now)) {
            return RwLockUpgradableReadGuard::downgrade(slots);
        }
        let mut slots = RwLockUpgradableReadGuard::upgrade(slots);
        expire_stale(&mut slots, now);
        RwLockWriteGuard::downgrade(slots)
    }
}

/// Lowest `(created_at, index)` among inactive slots. Never-used slots carry
/// `created_at == 0` and therefore always come first.
pub(crate) fn select_slot(slots: &[Session]) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, session)| !session.active)
        .min_by_key(|(index, session)| (session.created_at, *index))
        .map(|(index, _)| index)
}

fn expire_stale(slots: &mut [Session], now: u32) -> usize {
    let mut expired = 0;
    for session in slots.iter_mut().filter(|s| s.is_stale_at(now)) {
        session.active = false;
        expired += 1;
    }
    if expired > 0 {
        tracing::debug!(expired, now, "swept expired sessions");
    }
    expired
}

fn active_slot_mut(slots: &mut [Session], slot_id: usize) -> Result<&mut Session, PoolError> {
    let session = slots
        .get_mut(slot_id)
        .ok_or(PoolError::InvalidId(slot_id))?;
    if !session.active {
        return Err(PoolError::NotFound(slot_id as SlotId));
    }
    Ok(session)
}

fn apply_binding(session: &mut Session, binding: TokenBinding, now: u32) {
    session.access_token_hash = binding.access_token_hash;
    session.refresh_token_hash = binding.refresh_token_hash;
    session.expires_at = binding.expires_at;
    session.last_access_at = now;
}
