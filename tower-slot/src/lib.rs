//! # Tower Slot
//!
//! `tower-slot` bounds the number of in-flight requests to a
//! [Tower](https://github.com/tower-rs/tower) service using a
//! [`slot_limit::NonBlocking`] limiter.
//!
//! Unlike `tower::limit::ConcurrencyLimit`, which returns `Poll::Pending` until a
//! slot frees, these services never wait: a request arriving while every slot is
//! taken fails immediately with [`SlotError::Overloaded`].
//!
//! ## The Managed Stack
//! [`ManagedConcurrencyLayer`] is a pre-composed stack designed to handle common
//! production requirements:
//!
//! 1. **Load Shedding**: Immediately rejects requests with `SlotError::Overloaded`
//!    when the limiter is full, preventing memory exhaustion.
//! 2. **Timeouts**: Fails requests with `SlotError::Timeout` if the inner service
//!    takes longer than a defined duration, releasing their slot.
//! 3. **Error Mapping**: Converts internal Tower errors (like
//!    `tower::timeout::error::Elapsed`) into a unified, cloneable [`SlotError`] domain.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`SlotError`], allowing automatic conversion
//!   to HTTP status codes (408, 503, 500).

mod error;
mod layer;
mod managed_layer;
mod service;
mod utils;


pub use error::SlotError;
pub use layer::ConcurrencyLimitLayer;
pub use managed_layer::ManagedConcurrencyLayer;
pub use service::ConcurrencyLimitService;
pub use service::ResponseFuture;
pub use utils::ServiceBuilderExt;
