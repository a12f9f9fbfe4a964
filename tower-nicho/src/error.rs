use std::time::Duration;

use http::HeaderValue;
use http::Response;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http::header::RETRY_AFTER;

use crate::headers::RateLimitHeaders;

/// Machine-readable error kind placed in every 429 body.
pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";

/// Errors produced by the rate limiting middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The caller used up its quota for the current window.
    ///
    /// Converts to `429 Too Many Requests` with the rate-limit headers and a
    /// `Retry-After` header. When the `axum` feature is enabled this also
    /// implements `IntoResponse`.
    #[error("Rate limit exceeded; retry after {retry_after:?}")]
    RateLimited {
        /// Quota of the limiter that rejected the request.
        limit: u32,
        /// End of the current window, in epoch milliseconds.
        reset_time: u64,
        /// Time left until `reset_time`.
        retry_after: Duration,
        /// Human readable explanation for the client.
        message: String,
    },
}

impl GateError {
    /// `Retry-After` in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::RateLimited { retry_after, .. } => (retry_after.as_millis() as u64).div_ceil(1000),
        }
    }

    /// Builds the HTTP response sent back to the rejected client.
    pub fn to_http_response<B>(&self) -> Response<B>
    where
        B: From<String>,
    {
        let Self::RateLimited {
            limit,
            reset_time,
            message,
            ..
        } = self;

        let body = serde_json::json!({
            "error": RATE_LIMIT_EXCEEDED,
            "message": message,
            "resetTime": reset_time,
        });

        let mut response = Response::new(B::from(body.to_string()));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        RateLimitHeaders {
            limit: *limit,
            remaining: 0,
            reset: *reset_time,
        }
        .apply(headers);
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        response
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        self.to_http_response::<axum::body::Body>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::X_RATELIMIT_LIMIT;
    use crate::headers::X_RATELIMIT_REMAINING;
    use crate::headers::X_RATELIMIT_RESET;

    fn rejection(retry_after_ms: u64) -> GateError {
        GateError::RateLimited {
            limit: 5,
            reset_time: 1_700_000_000_000,
            retry_after: Duration::from_millis(retry_after_ms),
            message: "Too many login attempts".to_string(),
        }
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        assert_eq!(rejection(0).retry_after_secs(), 0);
        assert_eq!(rejection(1).retry_after_secs(), 1);
        assert_eq!(rejection(1_000).retry_after_secs(), 1);
        assert_eq!(rejection(1_001).retry_after_secs(), 2);
        assert_eq!(rejection(899_999).retry_after_secs(), 900);
    }

    #[test]
    fn it_renders_a_429_with_headers_and_json_body() {
        let response: Response<String> = rejection(2_500).to_http_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "1700000000000");
        assert_eq!(headers[RETRY_AFTER], "3");
        assert_eq!(headers[CONTENT_TYPE], "application/json");

        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Rate limit exceeded",
                "message": "Too many login attempts",
                "resetTime": 1_700_000_000_000u64,
            })
        );
    }

    #[test]
    fn display_mentions_the_wait() {
        let text = rejection(1_500).to_string();
        assert!(text.starts_with("Rate limit exceeded"));
        assert!(text.contains("1.5s"));
    }
}
