use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tokio::time::Timeout;
use tokio::time::timeout;
use tower::BoxError;
use tower::Service;
use tracing::debug;
use tracing::trace;

use slot_limit::Limiter;
use slot_limit::NonBlocking;
use slot_limit::OwnedPermit;

use crate::error::SlotError;

#[derive(Clone, Debug)]
struct ConcurrencyLimitMetrics {
    shed: Counter<u64>,
}

/// Bounds the number of in-flight requests to an inner service.
///
/// A slot is taken from the shared [`NonBlocking`] limiter in `poll_ready`. If none
/// is free the service fails at once with [`SlotError::Overloaded`]. The slot is
/// carried by the response future and released when that future completes or is
/// dropped.
#[derive(Debug)]
pub struct ConcurrencyLimitService<S> {
    inner: S,
    limiter: Arc<NonBlocking>,
    permit: Option<OwnedPermit>,
    timeout: Option<Duration>,
    instruments: ConcurrencyLimitMetrics,
}

pin_project! {
    /// Response future that holds a concurrency slot until the inner future resolves.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: Option<Timeout<F>>,
        permit: Option<OwnedPermit>,
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let Some(inner) = this.inner.as_pin_mut() else {
            return Poll::Ready(Err(E::from(BoxError::from(SlotError::Overloaded))));
        };

        let res = match inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(res)) => res,
            Poll::Ready(Err(_)) => Err(E::from(BoxError::from(SlotError::Timeout))),
        };

        // Free the slot now rather than whenever the caller drops the future.
        drop(this.permit.take());
        Poll::Ready(res)
    }
}

// Clones share the limiter but never a slot.
impl<S> Clone for ConcurrencyLimitService<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            permit: None,
            timeout: self.timeout,
            instruments: self.instruments.clone(),
        }
    }
}

impl<S, Req> Service<Req> for ConcurrencyLimitService<S>
where
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Check inner service readiness FIRST so a slot is never held while pending.
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        if self.permit.is_none() {
            match Arc::clone(&self.limiter).try_acquire_owned() {
                Some(permit) => {
                    trace!(in_flight = self.limiter.in_flight(), "concurrency slot taken");
                    self.permit = Some(permit);
                }
                None => {
                    self.record_shed();
                    return Poll::Ready(Err(Box::new(SlotError::Overloaded)));
                }
            }
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let Some(permit) = self.permit.take() else {
            // `poll_ready` was skipped or failed; never call the inner service without a slot.
            self.record_shed();
            return ResponseFuture {
                inner: None,
                permit: None,
            };
        };

        let timeout_duration = self
            .timeout
            .unwrap_or(Duration::from_secs(3600 * 24 * 365)); // Effective infinity

        ResponseFuture {
            inner: Some(timeout(timeout_duration, self.inner.call(req))),
            permit: Some(permit),
        }
    }
}

impl<S> ConcurrencyLimitService<S> {
    pub fn new(inner: S, limiter: Arc<NonBlocking>) -> Self {
        let meter = global::meter("concurrency_limit_service");
        let instruments = ConcurrencyLimitMetrics {
            shed: meter.u64_counter("requests_shed").build(),
        };

        Self {
            inner,
            limiter,
            permit: None,
            timeout: None,
            instruments,
        }
    }

    /// Fail any request that holds its slot for longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The limiter shared by this service and all of its clones.
    pub fn limiter(&self) -> &Arc<NonBlocking> {
        &self.limiter
    }

    fn record_shed(&self) {
        let max = self.limiter.max();
        debug!(max, "concurrency limit reached, shedding request");
        self.instruments
            .shed
            .add(1, &[KeyValue::new("max", max as i64)]);
    }
}
