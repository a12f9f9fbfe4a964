//! # Tower Nicho
//!
//! `tower-nicho` puts the keyed limiters of [`nicho_limit`] in front of
//! [Tower](https://github.com/tower-rs/tower) HTTP services.
//!
//! ## The Gate
//!
//! [`RateLimitLayer`] wraps any service speaking `http::Request` /
//! `http::Response`:
//!
//! 1. **Keying**: each request is keyed by client address (see
//!    [`client_identifier`]) or by one explicit identifier.
//! 2. **Shed, never queue**: an over-quota request is answered immediately with
//!    `429 Too Many Requests`, `Retry-After` and a JSON body. The inner service
//!    is not called.
//! 3. **Headers**: admitted responses carry `X-RateLimit-Limit`,
//!    `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
//!
//! Expired keys are evicted by a [`CleanupTask`] owned by the application.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`GateError`].
//! - `server`: Builds the `nicho-gate` demo server.

mod error;
mod headers;
mod identity;
mod layer;
mod service;
mod sweeper;


pub use error::GateError;
pub use error::RATE_LIMIT_EXCEEDED;
pub use headers::RateLimitHeaders;
pub use headers::X_RATELIMIT_LIMIT;
pub use headers::X_RATELIMIT_REMAINING;
pub use headers::X_RATELIMIT_RESET;
pub use identity::Identifier;
pub use identity::UNKNOWN_CLIENT;
pub use identity::X_FORWARDED_FOR;
pub use identity::X_REAL_IP;
pub use identity::client_identifier;
pub use identity::header_value;
pub use layer::DEFAULT_MESSAGE;
pub use layer::RateLimitLayer;
pub use service::RateLimitService;
pub use service::ResponseFuture;
pub use sweeper::CleanupTask;
