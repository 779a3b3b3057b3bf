use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use slot_limit::NonBlocking;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::util::BoxCloneSyncService;

use crate::ConcurrencyLimitService;
use crate::SlotError;

/// A pre-composed, shed-first concurrency limiting stack.
///
/// Excess requests are never queued in memory: when every slot is taken the
/// request fails immediately.
///
/// ### Error Responsibilities:
/// - **`SlotError::Overloaded`**: every slot was taken. This happens at the
///   `poll_ready` stage and is near-instant.
/// - **`SlotError::Timeout`**: the *inner service* took longer than `max_wait`
///   to respond. Its slot is released when this happens.
/// - **`SlotError::Inner`**: any other error from the inner service.
pub struct ManagedConcurrencyLayer<Req> {
    limiter: Arc<NonBlocking>,
    max_wait: Duration,
    _phantom: PhantomData<fn(Req)>,
}

// Note: Deriving Clone would require `Req: Clone`, which Axum requests are not.
impl<Req> Clone for ManagedConcurrencyLayer<Req> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            max_wait: self.max_wait,
            _phantom: PhantomData,
        }
    }
}

impl<S, Req> Layer<S> for ManagedConcurrencyLayer<Req>
where
    S: Service<Req, Error = BoxError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: 'static,
    Req: Send + 'static,
{
    type Service = BoxCloneSyncService<Req, S::Response, BoxError>;

    fn layer(&self, inner: S) -> Self::Service {
        let limited = ConcurrencyLimitService::new(inner, Arc::clone(&self.limiter));

        // Timeout is outer so the deadline covers the whole request.
        let svc = tower::ServiceBuilder::new()
            .timeout(self.max_wait)
            .service(limited);

        let mapped_svc = tower::util::MapErr::new(svc, |err: BoxError| {
            if err.is::<tower::timeout::error::Elapsed>() {
                BoxError::from(SlotError::Timeout)
            } else if err.is::<SlotError>() {
                err
            } else {
                BoxError::from(SlotError::Inner(err.to_string()))
            }
        });

        BoxCloneSyncService::new(mapped_svc)
    }
}

impl<Req> ManagedConcurrencyLayer<Req> {
    pub fn new(limiter: Arc<NonBlocking>, max_wait: Duration) -> Self {
        Self {
            limiter,
            max_wait,
            _phantom: PhantomData,
        }
    }
}
