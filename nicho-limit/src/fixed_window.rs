use std::num::NonZeroU32;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use tracing::trace;

use super::Decision;
use super::Stats;
use super::Strategy;

/// Counter state for one key within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RateLimitEntry {
    count: u32,
    reset_time: u64,
}

impl RateLimitEntry {
    fn open(now: u64, window: u64) -> Self {
        Self {
            count: 1,
            reset_time: now.saturating_add(window),
        }
    }

    fn expired(&self, now: u64) -> bool {
        now > self.reset_time
    }
}

/// A keyed, window-based limiter.
///
/// Each key gets its own window, opened by the first request seen for it.
/// It is the simplest strategy but can be susceptible to "boundary bursts"
/// where double the limit is allowed in a short period spanning two windows.
///
/// The store is sharded, and a check holds its key's shard for the whole
/// read-decide-write sequence, so concurrent checks on the same key never
/// over-admit.
#[derive(Debug)]
pub struct FixedWindow {
    name: String,
    max_requests: u32,
    window: u64,
    store: DashMap<String, RateLimitEntry>,
}

impl Strategy for FixedWindow {
    fn check(&self, key: &str, now: u64) -> Decision {
        let decision = match self.store.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) if !occupied.get().expired(now) => {
                let entry = occupied.get_mut();
                if entry.count >= self.max_requests {
                    Decision {
                        allowed: false,
                        remaining: 0,
                        reset_time: entry.reset_time,
                    }
                } else {
                    entry.count += 1;
                    Decision {
                        allowed: true,
                        remaining: self.max_requests - entry.count,
                        reset_time: entry.reset_time,
                    }
                }
            }
            // Unknown key, or its window is over: start a fresh one.
            stale => {
                let entry = RateLimitEntry::open(now, self.window);
                stale.insert(entry);
                Decision {
                    allowed: true,
                    remaining: self.max_requests - 1,
                    reset_time: entry.reset_time,
                }
            }
        };

        if decision.allowed {
            trace!(
                limiter = %self.name,
                key,
                remaining = decision.remaining,
                "Request admitted"
            );
        } else {
            trace!(
                limiter = %self.name,
                key,
                reset_time = decision.reset_time,
                "Rate limit exceeded"
            );
        }
        decision
    }

    fn stats(&self, key: &str) -> Option<Stats> {
        self.store.get(key).map(|entry| Stats {
            count: entry.count,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
        })
    }

    fn cleanup(&self, now: u64) -> usize {
        let mut evicted = 0;
        self.store.retain(|_, entry| {
            let keep = !entry.expired(now);
            if !keep {
                evicted += 1;
            }
            keep
        });

        if evicted > 0 {
            debug!(
                limiter = %self.name,
                evicted,
                live = self.store.len(),
                "Evicted expired rate limit entries"
            );
        }
        evicted
    }

    fn limit(&self) -> u32 {
        self.max_requests
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.window)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - The maximum number of requests allowed per key within a single window.
    /// * `window` - The duration of the fixed time window. Sub-millisecond precision is dropped.
    pub fn new(max_requests: NonZeroU32, window: Duration) -> Self {
        Self {
            name: String::from("default"),
            max_requests: max_requests.get(),
            window: window.as_millis() as u64,
            store: DashMap::new(),
        }
    }

    /// Sets the name reported in logs and metrics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of keys currently tracked, expired or not.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
