//! # slot-limit
//!
//! `slot-limit` bounds the number of concurrent executions of a piece of work.
//!
//! ## Core Philosophy
//!
//! Each limiter owns a small counter of in-flight work, guarded by its own lock, and a
//! fixed ceiling. The lock only covers admission bookkeeping: the work itself always
//! runs outside it, so admitted callers execute in parallel.
//!
//! ## Key Concepts
//!
//! * **Slot**: one unit of admitted capacity. A limiter created with `max` has `max` slots.
//! * **Blocking**: [`Blocking`] suspends callers until a slot frees.
//! * **Non-Blocking**: [`NonBlocking`] never suspends; a full limiter runs the caller's
//!   `over_limit` closure instead.
//! * **Permits**: admission is represented by an RAII permit. Dropping it releases the
//!   slot, so release happens on every exit path, including a panic in the work.
//!
//! ## Example
//!
//! ```rust
//! use slot_limit::Blocking;
//! use slot_limit::NonBlocking;
//!
//! let blocking = Blocking::new(4).unwrap();
//! let answer = blocking.run(|| 6 * 7);
//! assert_eq!(answer, 42);
//!
//! let non_blocking = NonBlocking::new(1).unwrap();
//! let admitted = non_blocking.run(|| true, || false);
//! assert!(admitted);
//! ```

use std::fmt::Debug;

mod blocking;
mod error;
mod non_blocking;

pub use blocking::Blocking;
pub use blocking::BlockingPermit;
pub use blocking::OwnedBlockingPermit;
pub use error::LimitError;
pub use non_blocking::NonBlocking;
pub use non_blocking::OwnedPermit;
pub use non_blocking::Permit;

/// Common observations over a concurrency limiter.
///
/// Limiters must be `Send` and `Sync` so they can be shared across threads via `Arc`.
pub trait Limiter: Debug + Send + Sync {
    /// The fixed ceiling on concurrently admitted work.
    fn max(&self) -> usize;

    /// A snapshot of the number of admitted, not yet released, callers.
    ///
    /// The value may be stale by the time the caller inspects it.
    fn in_flight(&self) -> usize;

    /// A snapshot of the number of free slots.
    fn available(&self) -> usize {
        self.max().saturating_sub(self.in_flight())
    }
}
