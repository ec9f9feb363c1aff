use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};

/// Source of wall-clock time in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u32;
}

/// Reads the system clock through chrono.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        let secs = Utc::now().timestamp();
        u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
    }
}

/// A settable clock for tests and offline tools.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub fn new(now: u32) -> Self {
        Self {
            now: AtomicU32::new(now),
        }
    }

    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u32) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Converts stored unix seconds into a UTC timestamp.
pub fn to_datetime(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or(DateTime::UNIX_EPOCH)
}
