//! Sliding-window admission control for upstream sources
//!
//! Bounds the outbound call rate per source key over a trailing window.
//! Purely in-memory and monotonic-clock based; nothing survives a restart.
//! Concurrent acquirers can race across await points, so callers that wait
//! out [`RateLimiter::wait_time`] must re-check [`RateLimiter::try_acquire`]
//! afterwards.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-source sliding-window rate limiter.
///
/// Each key tracks the instants of its requests inside the trailing window;
/// entries older than the window are pruned on every check.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    quotas: HashMap<String, usize>,
    default_quota: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration, default_quota: usize) -> Self {
        Self {
            windows: DashMap::new(),
            quotas: HashMap::new(),
            default_quota,
            window,
        }
    }

    /// Override the quota for one source key.
    pub fn with_quota(mut self, key: impl Into<String>, quota: usize) -> Self {
        self.quotas.insert(key.into(), quota);
        self
    }

    /// Try to admit one request for `key` right now.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    /// Try to admit one request for `key` at an explicit instant.
    ///
    /// Returns false without side effects when the pruned window already
    /// holds quota-many entries; otherwise records the instant.
    pub fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let quota = self.quota_for(key);
        let mut entries = self.windows.entry(key.to_string()).or_default();
        Self::prune(&mut entries, now, self.window);

        if entries.len() >= quota {
            return false;
        }
        entries.push_back(now);
        true
    }

    /// How long until the next request for `key` would be admitted.
    pub fn wait_time(&self, key: &str) -> Duration {
        self.wait_time_at(key, Instant::now())
    }

    /// Wait time at an explicit instant: zero under quota, otherwise the
    /// remainder of the window measured from the oldest tracked request.
    pub fn wait_time_at(&self, key: &str, now: Instant) -> Duration {
        let quota = self.quota_for(key);
        let mut entries = self.windows.entry(key.to_string()).or_default();
        Self::prune(&mut entries, now, self.window);

        if entries.len() < quota {
            return Duration::ZERO;
        }
        match entries.front() {
            Some(oldest) => self
                .window
                .saturating_sub(now.saturating_duration_since(*oldest)),
            None => Duration::ZERO,
        }
    }

    fn quota_for(&self, key: &str) -> usize {
        self.quotas.get(key).copied().unwrap_or(self.default_quota)
    }

    fn prune(entries: &mut VecDeque<Instant>, now: Instant, length: Duration) {
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= length {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}
