use std::sync::Arc;

use nicho_limit::Clock;
use nicho_limit::Strategy;
use nicho_limit::SystemClock;
use tower::Layer;

use crate::identity::Identifier;
use crate::service::RateLimitService;

/// Message sent to rejected clients unless [`RateLimitLayer::with_message`] says otherwise.
pub const DEFAULT_MESSAGE: &str = "Too many requests. Please try again later.";

/// Gates requests through a keyed rate limiter.
#[derive(Debug)]
pub struct RateLimitLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    identifier: Identifier,
    clock: Arc<dyn Clock>,
    message: Arc<str>,
}

impl<L> Clone for RateLimitLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            identifier: self.identifier.clone(),
            clock: Arc::clone(&self.clock),
            message: Arc::clone(&self.message),
        }
    }
}

impl<L> RateLimitLayer<L>
where
    L: Strategy + ?Sized,
{
    /// Create a RateLimitLayer keyed by client address, on wall-clock time.
    pub fn new(limiter: Arc<L>) -> Self {
        RateLimitLayer {
            limiter,
            identifier: Identifier::default(),
            clock: Arc::new(SystemClock),
            message: Arc::from(DEFAULT_MESSAGE),
        }
    }

    /// Use one explicit key for every request instead of the client address.
    pub fn with_identifier(mut self, key: impl Into<Arc<str>>) -> Self {
        self.identifier = Identifier::fixed(key);
        self
    }

    /// Set the clock used to decide windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the human readable message placed in rejection bodies.
    pub fn with_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.message = message.into();
        self
    }
}

impl<L, S> Layer<S> for RateLimitLayer<L>
where
    L: Strategy + ?Sized,
{
    type Service = RateLimitService<L, S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService::new(service, self.limiter.clone())
            .with_identifier(self.identifier.clone())
            .with_clock(self.clock.clone())
            .with_message(self.message.clone())
    }
}
