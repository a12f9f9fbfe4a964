//! # nicho-limit
//!
//! `nicho-limit` provides keyed, in-memory, fixed-window rate limiting for the
//! NichoFy HTTP services (login, contact form, generic API, content generation).
//!
//! ## Core Philosophy
//!
//! Every limiter owns its own counter store. There are no process-wide
//! singletons: the application builds its limiters once (see [`Limiters`]) and
//! hands them to whatever needs them.
//!
//! ## Key Concepts
//!
//! * **Fixed Window**: each key accumulates a count that resets entirely once
//!   its window ends. Bursts at a window boundary are allowed.
//! * **Rejections are free**: a rejected request does not consume quota and
//!   does not extend the window.
//! * **Explicit Time**: every operation takes `now` in epoch milliseconds, so
//!   callers (and tests) decide which [`Clock`] drives the limiter.
//! * **Explicit Cleanup**: expired keys are only evicted by [`Strategy::cleanup`].
//!   Nothing runs in the background unless the host schedules it.
//!
//! ## Example
//!
//! ```rust
//! use nicho_limit::FixedWindow;
//! use nicho_limit::Strategy;
//! use std::num::NonZeroU32;
//! use std::time::Duration;
//!
//! let limit = NonZeroU32::new(2).unwrap();
//! let limiter = FixedWindow::new(limit, Duration::from_millis(1000));
//!
//! assert!(limiter.check("10.0.0.1", 0).allowed);
//! assert!(limiter.check("10.0.0.1", 10).allowed);
//! assert!(!limiter.check("10.0.0.1", 20).allowed);
//! assert!(limiter.check("10.0.0.1", 1001).allowed);
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod clock;
mod config;
mod fixed_window;
mod registry;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use config::ConfigError;
pub use config::LimitConfig;
pub use config::LimitsConfig;
pub use fixed_window::FixedWindow;
pub use registry::Limiters;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// Outcome of a single [`Strategy::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Quota left in the current window. Always `0` when rejected.
    pub remaining: u32,
    /// End of the current window, in epoch milliseconds.
    pub reset_time: u64,
}

impl Decision {
    /// Converts the decision into a flow signal relative to `now`.
    ///
    /// A rejection carries the time left until the window resets.
    pub fn flow(&self, now: u64) -> ControlFlow<Reason> {
        if self.allowed {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(Reason::Overloaded {
                retry_after: Duration::from_millis(self.reset_time.saturating_sub(now)),
            })
        }
    }
}

/// Read-only snapshot of the counter for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub count: u32,
    pub remaining: u32,
    pub reset_time: u64,
}

/// The core trait for keyed rate-limiting algorithms.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Strategy: Debug {
    /// Decides whether the request identified by `key` is admitted at `now`
    /// (epoch milliseconds), updating the counter for that key only.
    ///
    /// This never fails: a rejection is an ordinary [`Decision`].
    fn check(&self, key: &str, now: u64) -> Decision;

    /// Returns the current counter for `key` without creating one.
    fn stats(&self, key: &str) -> Option<Stats>;

    /// Evicts every key whose window ended before `now`, returning how many
    /// were removed.
    fn cleanup(&self, now: u64) -> usize;

    /// Maximum number of admitted requests per key and window.
    fn limit(&self) -> u32;

    /// Length of a window.
    fn window(&self) -> Duration;

    /// Name used in logs and metrics.
    fn name(&self) -> &str;
}
