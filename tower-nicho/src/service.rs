use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use http::Request;
use http::Response;
use nicho_limit::Clock;
use nicho_limit::Reason;
use nicho_limit::Strategy;
use nicho_limit::SystemClock;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::Service;
use tracing::debug;

use crate::error::GateError;
use crate::headers::RateLimitHeaders;
use crate::identity::Identifier;
use crate::layer::DEFAULT_MESSAGE;

#[derive(Clone, Debug)]
struct RateLimitServiceMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
    attributes: Arc<[KeyValue]>,
}

impl RateLimitServiceMetrics {
    fn new(limiter: &str) -> Self {
        let meter = global::meter("rate_limit_service");
        Self {
            admitted: meter.u64_counter("admitted").build(),
            rejected: meter.u64_counter("rejected").build(),
            attributes: Arc::new([KeyValue::new("limiter", limiter.to_owned())]),
        }
    }
}

/// Checks every request against a keyed limiter before handing it to the
/// inner service.
///
/// Rejected requests never reach the inner service; they are answered with a
/// `429` built from [`GateError::RateLimited`]. Admitted requests get the
/// `X-RateLimit-*` headers added to whatever the inner service returns.
/// Errors from the inner service pass through untouched.
#[derive(Debug)]
pub struct RateLimitService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    identifier: Identifier,
    clock: Arc<dyn Clock>,
    message: Arc<str>,
    instruments: RateLimitServiceMetrics,
}

impl<L, S> Clone for RateLimitService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            identifier: self.identifier.clone(),
            clock: Arc::clone(&self.clock),
            message: Arc::clone(&self.message),
            instruments: self.instruments.clone(),
        }
    }
}

pin_project! {
    /// Response future of [`RateLimitService`].
    pub struct ResponseFuture<F, B> {
        #[pin]
        kind: Kind<F, B>,
    }
}

pin_project! {
    #[project = KindProj]
    enum Kind<F, B> {
        Admitted {
            #[pin]
            future: F,
            headers: RateLimitHeaders,
        },
        Rejected {
            response: Option<Response<B>>,
        },
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Admitted { future, headers } => {
                let response = ready!(future.poll(cx))?;
                Poll::Ready(Ok(headers.merge_into(response)))
            }
            KindProj::Rejected { response } => {
                let response = response
                    .take()
                    .expect("ResponseFuture polled after completion");
                Poll::Ready(Ok(response))
            }
        }
    }
}

impl<L, S, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<L, S>
where
    L: Strategy + ?Sized,
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: From<String>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The limiter never blocks, so readiness is the inner service's.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let now = self.clock.now();
        let (key, decision) = {
            let key = self.identifier.resolve(req.headers());
            let decision = self.limiter.check(&key, now);
            (key.into_owned(), decision)
        };
        let attributes = &*self.instruments.attributes;

        let kind = match decision.flow(now) {
            ControlFlow::Continue(()) => {
                self.instruments.admitted.add(1, attributes);
                Kind::Admitted {
                    future: self.inner.call(req),
                    headers: RateLimitHeaders::new(self.limiter.limit(), &decision),
                }
            }
            ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                self.instruments.rejected.add(1, attributes);
                debug!(
                    limiter = self.limiter.name(),
                    key = %key,
                    method = %req.method(),
                    path = req.uri().path(),
                    "Request rejected by rate limiter"
                );
                let rejection = GateError::RateLimited {
                    limit: self.limiter.limit(),
                    reset_time: decision.reset_time,
                    retry_after,
                    message: self.message.to_string(),
                };
                Kind::Rejected {
                    response: Some(rejection.to_http_response()),
                }
            }
        };

        ResponseFuture { kind }
    }
}

impl<L, S> RateLimitService<L, S>
where
    L: Strategy + ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let instruments = RateLimitServiceMetrics::new(limiter.name());
        Self {
            inner,
            limiter,
            identifier: Identifier::default(),
            clock: Arc::new(SystemClock),
            message: Arc::from(DEFAULT_MESSAGE),
            instruments,
        }
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_message(mut self, message: Arc<str>) -> Self {
        self.message = message;
        self
    }

    /// The limiter gating this service.
    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}
