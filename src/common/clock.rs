//! Timestamps: the server-side clock and the client-side "latest observed" tracker

use crate::common::utils::timestamp_now_micros;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logical timestamp (microseconds since the epoch, bumped to stay unique)
pub type Timestamp = u64;

/// Monotonic clock that never hands out the same timestamp twice and can be
/// pushed forward by timestamps observed from elsewhere.
#[derive(Debug, Default)]
pub struct HybridClock {
    last: AtomicU64,
}

impl HybridClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, strictly greater than any previous one
    pub fn now(&self) -> Timestamp {
        let physical = timestamp_now_micros();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(physical.max(cur.saturating_add(1)))
            })
            .unwrap_or_else(|cur| cur);
        physical.max(prev.saturating_add(1))
    }

    /// Make every later `now()` return something greater than `ts`
    pub fn update(&self, ts: Timestamp) {
        self.last.fetch_max(ts, Ordering::SeqCst);
    }

    /// Last handed-out (or observed) timestamp
    pub fn last(&self) -> Timestamp {
        self.last.load(Ordering::SeqCst)
    }
}

/// Highest timestamp seen in any RPC response by one client
#[derive(Debug, Default)]
pub struct ObservedTimestamp {
    latest: AtomicU64,
}

impl ObservedTimestamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, ts: Timestamp) {
        self.latest.fetch_max(ts, Ordering::SeqCst);
    }

    /// `None` until the first timestamp has been observed
    pub fn latest(&self) -> Option<Timestamp> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            ts => Some(ts),
        }
    }
}
