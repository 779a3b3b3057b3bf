use std::sync::Arc;
use std::time::Duration;

use slot_limit::NonBlocking;
use tower::Layer;

use crate::service::ConcurrencyLimitService;

/// Applies a shedding concurrency limit to requests.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimitLayer {
    limiter: Arc<NonBlocking>,
    timeout: Option<Duration>,
}

impl ConcurrencyLimitLayer {
    /// Create a ConcurrencyLimitLayer
    ///
    /// Every service produced by this layer shares `limiter`, so the limit applies
    /// across all of them.
    pub fn new(limiter: Arc<NonBlocking>) -> Self {
        ConcurrencyLimitLayer {
            limiter,
            timeout: None,
        }
    }

    /// Set a timeout for request execution.
    ///
    /// If a request holds its slot for longer than this duration, the service
    /// will return `SlotError::Timeout` and free the slot.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<S> Layer<S> for ConcurrencyLimitLayer {
    type Service = ConcurrencyLimitService<S>;

    fn layer(&self, service: S) -> Self::Service {
        let svc = ConcurrencyLimitService::new(service, Arc::clone(&self.limiter));
        match self.timeout {
            Some(timeout) => svc.with_timeout(timeout),
            None => svc,
        }
    }
}
