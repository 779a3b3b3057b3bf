use std::sync::Arc;
use std::time::Duration;

use slot_limit::NonBlocking;
use tower::ServiceBuilder;
use tower::layer::util::Stack;

use crate::ConcurrencyLimitLayer;

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Add a layer that sheds requests once `limiter` is full
    fn concurrency_limit_shed(
        self,
        limiter: Arc<NonBlocking>,
    ) -> ServiceBuilder<Stack<ConcurrencyLimitLayer, L>>;

    /// Add a layer that sheds requests once `limiter` is full and fails
    /// requests that hold a slot for longer than `timeout`
    fn concurrency_limit_timeout(
        self,
        limiter: Arc<NonBlocking>,
        timeout: Duration,
    ) -> ServiceBuilder<Stack<ConcurrencyLimitLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn concurrency_limit_shed(
        self,
        limiter: Arc<NonBlocking>,
    ) -> ServiceBuilder<Stack<ConcurrencyLimitLayer, L>> {
        self.layer(ConcurrencyLimitLayer::new(limiter))
    }

    fn concurrency_limit_timeout(
        self,
        limiter: Arc<NonBlocking>,
        timeout: Duration,
    ) -> ServiceBuilder<Stack<ConcurrencyLimitLayer, L>> {
        self.layer(ConcurrencyLimitLayer::new(limiter).with_timeout(timeout))
    }
}
