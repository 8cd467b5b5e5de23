use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in seconds since the epoch, used for access-token expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 { chrono::Utc::now().timestamp() }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now: i64) -> Self { Self(AtomicI64::new(now)) }
    pub fn set(&self, now: i64) { self.0.store(now, Ordering::SeqCst); }
    pub fn advance(&self, secs: i64) { self.0.fetch_add(secs, Ordering::SeqCst); }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 { self.0.load(Ordering::SeqCst) }
}
