use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Condvar;
use parking_lot::Mutex;

use super::LimitError;
use super::Limiter;

/// A limiter that suspends callers until a slot is free.
///
/// At most `max` callers are admitted at once. Any further caller waits on a
/// condition variable until an admitted caller releases its slot. Waiters are not
/// served in arrival order: when a slot frees, one waiter is woken, and which one
/// is unspecified.
///
/// Calling [`Blocking::run`] on the same limiter from inside the work it runs will
/// deadlock once the limiter is full.
#[derive(Debug)]
pub struct Blocking {
    count: Mutex<usize>,
    released: Condvar,
    max: usize,
}

impl Blocking {
    /// Creates a new `Blocking` limiter admitting at most `max` concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if `max` is zero.
    pub fn new(max: usize) -> Result<Self, LimitError> {
        NonZeroUsize::new(max)
            .map(Self::with_capacity)
            .ok_or(LimitError::InvalidConfiguration)
    }

    /// Creates a new `Blocking` limiter from a ceiling that is known to be valid.
    pub fn with_capacity(max: NonZeroUsize) -> Self {
        Self {
            count: Mutex::new(0),
            released: Condvar::new(),
            max: max.get(),
        }
    }

    /// Waits for a slot, then invokes `work` and returns its result.
    ///
    /// The slot is held for exactly as long as `work` runs. If `work` panics, the
    /// slot is released and one waiter woken before the panic continues to unwind
    /// into the caller.
    pub fn run<F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _permit = self.acquire();
        work()
    }

    /// Waits for a slot and returns a permit holding it.
    pub fn acquire(&self) -> BlockingPermit<'_> {
        self.admit();
        BlockingPermit { limiter: self }
    }

    /// Waits for a slot and returns a permit that owns a handle to the limiter.
    pub fn acquire_owned(self: Arc<Self>) -> OwnedBlockingPermit {
        self.admit();
        OwnedBlockingPermit { limiter: self }
    }

    fn admit(&self) {
        let mut count = self.count.lock();
        while *count >= self.max {
            self.released.wait(&mut count);
        }
        *count += 1;
        // Nobody waits for the count to go up, so there is no one to wake here.
    }

    fn release(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        drop(count);

        // Only one slot freed, so only one waiter can make progress.
        self.released.notify_one();
    }
}

impl Limiter for Blocking {
    fn max(&self) -> usize {
        self.max
    }

    fn in_flight(&self) -> usize {
        *self.count.lock()
    }
}

/// A slot admitted by [`Blocking::acquire`]. The slot is released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct BlockingPermit<'a> {
    limiter: &'a Blocking,
}

impl Drop for BlockingPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// A slot admitted by [`Blocking::acquire_owned`]. The slot is released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct OwnedBlockingPermit {
    limiter: Arc<Blocking>,
}

impl Drop for OwnedBlockingPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
