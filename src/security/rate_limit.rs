//! Per-user request budgets over a fixed window.
//!
//! The window is reset, not sliding: the first request after `reset_at`
//! starts a fresh window with a count of one. Rejection is immediate; no
//! queueing or backoff is offered.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Outcome of recording one request against a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests counted in the current window, including this one if allowed.
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Counter storage. The in-memory store is process-local; a shared counter
/// service can implement this trait for multi-instance deployments.
pub trait RateLimitStore: Send + Sync {
    /// Record a request for `key` and decide whether it is within `limit`.
    fn hit(&self, key: &str, limit: u32, window: TimeDelta, now: DateTime<Utc>) -> RateLimitDecision;

    /// Drop counters whose window has elapsed. Returns how many were removed.
    fn sweep_expired(&self, now: DateTime<Utc>) -> usize;

    /// Number of keys currently tracked.
    fn tracked_keys(&self) -> usize;
}

/// End of a window opened at `now`, saturating at the latest representable instant.
fn window_end(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy)]
struct RateLimitCounter {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// `DashMap`-backed store. Each key's read-modify-write happens under the
/// shard lock, so concurrent requests for one user cannot both slip through.
pub struct InMemoryRateLimitStore {
    counters: DashMap<String, RateLimitCounter>,
    next_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            next_sweep: Mutex::new(None),
        }
    }

    /// Sweep at most once per window, lazily, on the request path.
    fn maybe_sweep(&self, window: TimeDelta, now: DateTime<Utc>) {
        let due = {
            let mut next = self.next_sweep.lock();
            match *next {
                Some(at) if now < at => false,
                Some(_) => {
                    *next = Some(window_end(now, window));
                    true
                }
                None => {
                    *next = Some(window_end(now, window));
                    false
                }
            }
        };

        if due {
            let removed = self.sweep_expired(now);
            if removed > 0 {
                tracing::debug!(removed, "swept expired rate-limit counters");
            }
        }
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn hit(&self, key: &str, limit: u32, window: TimeDelta, now: DateTime<Utc>) -> RateLimitDecision {
        // Must run before the entry guard below is taken: retain() needs every shard.
        self.maybe_sweep(window, now);

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(RateLimitCounter {
                count: 0,
                reset_at: now,
            });
        let counter = entry.value_mut();

        if counter.count == 0 || now >= counter.reset_at {
            counter.count = 1;
            counter.reset_at = window_end(now, window);
            return RateLimitDecision {
                allowed: true,
                count: 1,
                reset_at: counter.reset_at,
            };
        }

        if counter.count >= limit {
            return RateLimitDecision {
                allowed: false,
                count: counter.count,
                reset_at: counter.reset_at,
            };
        }

        counter.count += 1;
        RateLimitDecision {
            allowed: true,
            count: counter.count,
            reset_at: counter.reset_at,
        }
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| now < c.reset_at);
        before.saturating_sub(self.counters.len())
    }

    fn tracked_keys(&self) -> usize {
        self.counters.len()
    }
}
