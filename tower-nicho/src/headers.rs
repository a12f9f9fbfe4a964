use http::HeaderMap;
use http::HeaderValue;
use http::Response;
use http::header::HeaderName;

use nicho_limit::Decision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// The `X-RateLimit-*` values attached to every gated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds.
    pub reset: u64,
}

impl RateLimitHeaders {
    pub fn new(limit: u32, decision: &Decision) -> Self {
        Self {
            limit,
            remaining: decision.remaining,
            reset: decision.reset_time,
        }
    }

    /// Inserts the headers, overwriting any value already present.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset));
    }

    /// Reassembles `response` with the headers merged in. Status, body and
    /// every other header are carried over untouched.
    pub fn merge_into<B>(&self, response: Response<B>) -> Response<B> {
        let (mut parts, body) = response.into_parts();
        self.apply(&mut parts.headers);
        Response::from_parts(parts, body)
    }
}
