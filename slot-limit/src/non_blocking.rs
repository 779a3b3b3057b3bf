use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;

use super::LimitError;
use super::Limiter;

/// A limiter that never suspends its callers.
///
/// While fewer than `max` callers are admitted, a caller is admitted and runs its
/// `under_limit` work. Once the limiter is full, a caller is refused immediately and
/// runs its `over_limit` work instead. A refused caller is not queued: to try again it
/// must call again.
#[derive(Debug)]
pub struct NonBlocking {
    count: Mutex<usize>,
    max: usize,
}

impl NonBlocking {
    /// Creates a new `NonBlocking` limiter admitting at most `max` concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] if `max` is zero.
    pub fn new(max: usize) -> Result<Self, LimitError> {
        NonZeroUsize::new(max)
            .map(Self::with_capacity)
            .ok_or(LimitError::InvalidConfiguration)
    }

    /// Creates a new `NonBlocking` limiter from a ceiling that is known to be valid.
    pub fn with_capacity(max: NonZeroUsize) -> Self {
        Self {
            count: Mutex::new(0),
            max: max.get(),
        }
    }

    /// Invokes exactly one of `under_limit` or `over_limit` and returns its result.
    ///
    /// `under_limit` runs while holding a slot, which is released when it returns or
    /// panics. `over_limit` runs without a slot and without waiting.
    pub fn run<U, O, R>(&self, under_limit: U, over_limit: O) -> R
    where
        U: FnOnce() -> R,
        O: FnOnce() -> R,
    {
        match self.try_acquire() {
            Some(_permit) => under_limit(),
            None => over_limit(),
        }
    }

    /// Takes a slot if one is free, without waiting.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        self.admit().then(|| Permit { limiter: self })
    }

    /// Takes a slot if one is free, returning a permit that owns a handle to the limiter.
    pub fn try_acquire_owned(self: Arc<Self>) -> Option<OwnedPermit> {
        if self.admit() {
            Some(OwnedPermit { limiter: self })
        } else {
            None
        }
    }

    fn admit(&self) -> bool {
        let mut count = self.count.lock();
        if *count >= self.max {
            return false;
        }
        *count += 1;
        true
    }

    fn release(&self) {
        *self.count.lock() -= 1;
    }
}

impl Limiter for NonBlocking {
    fn max(&self) -> usize {
        self.max
    }

    fn in_flight(&self) -> usize {
        *self.count.lock()
    }
}

/// A slot admitted by [`NonBlocking::try_acquire`]. The slot is released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit<'a> {
    limiter: &'a NonBlocking,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// A slot admitted by [`NonBlocking::try_acquire_owned`]. The slot is released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct OwnedPermit {
    limiter: Arc<NonBlocking>,
}

impl OwnedPermit {
    /// The limiter this permit was taken from.
    pub fn limiter(&self) -> &Arc<NonBlocking> {
        &self.limiter
    }
}

impl Drop for OwnedPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;
    use std::panic::catch_unwind;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use std::time::Instant;

    use more_asserts::assert_ge;
    use more_asserts::assert_le;
    use more_asserts::assert_lt;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Under,
        Over,
    }

    #[test]
    fn it_rejects_zero() {
        assert_eq!(
            NonBlocking::new(0).unwrap_err(),
            LimitError::InvalidConfiguration
        );
        assert!(NonBlocking::new(1).is_ok());
    }

    #[test]
    fn it_enforces_limits() {
        let limiter = NonBlocking::new(1).unwrap();

        let held = limiter.try_acquire().expect("first caller is admitted");
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.run(|| Outcome::Under, || Outcome::Over), Outcome::Over);

        drop(held);
        assert_eq!(limiter.run(|| Outcome::Under, || Outcome::Over), Outcome::Under);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_exactly_one_callback_per_call() {
        let max = 4;
        let limiter = NonBlocking::new(max).unwrap();
        let under = AtomicUsize::new(0);
        let over = AtomicUsize::new(0);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let threads = 16;
        let calls = 200;
        let barrier = Barrier::new(threads);

        thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    barrier.wait();
                    for _ in 0..calls {
                        limiter.run(
                            || {
                                under.fetch_add(1, Ordering::SeqCst);
                                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                thread::yield_now();
                                active.fetch_sub(1, Ordering::SeqCst);
                            },
                            || {
                                over.fetch_add(1, Ordering::SeqCst);
                            },
                        );
                    }
                });
            }
        });

        let under = under.load(Ordering::SeqCst);
        let over = over.load(Ordering::SeqCst);
        assert_eq!(under + over, threads * calls);
        assert_ge!(under, 1);
        assert_le!(peak.load(Ordering::SeqCst), max);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_refuses_immediately_when_full() {
        // A and B occupy both slots, C is refused at once and a fresh D is admitted
        // after A finishes.
        let limiter = NonBlocking::new(2).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_a, a_rx) = mpsc::channel::<()>();
        let (release_b, b_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let mut holders = Vec::new();
            for rx in [a_rx, b_rx] {
                let limiter = &limiter;
                let started_tx = started_tx.clone();
                holders.push(s.spawn(move || {
                    limiter.run(
                        || {
                            started_tx.send(()).unwrap();
                            rx.recv().unwrap();
                            Outcome::Under
                        },
                        || Outcome::Over,
                    )
                }));
            }
            for _ in 0..2 {
                started_rx.recv().unwrap();
            }

            let start = Instant::now();
            assert_eq!(limiter.run(|| Outcome::Under, || Outcome::Over), Outcome::Over);
            assert_lt!(start.elapsed(), Duration::from_secs(1));
            assert_eq!(limiter.in_flight(), 2);

            release_a.send(()).unwrap();
            let a = holders.remove(0);
            assert_eq!(a.join().unwrap(), Outcome::Under);

            assert_eq!(limiter.run(|| Outcome::Under, || Outcome::Over), Outcome::Under);

            release_b.send(()).unwrap();
        });

        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_panicking_work_releases_slot() {
        let max = 3;
        let limiter = NonBlocking::new(max).unwrap();

        for _ in 0..max {
            let result = catch_unwind(AssertUnwindSafe(|| {
                limiter.run::<_, _, ()>(|| panic!("work failed"), || ());
            }));
            assert!(result.is_err(), "panic should reach the caller");
        }

        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.run(|| Outcome::Under, || Outcome::Over), Outcome::Under);
    }

    #[test]
    fn test_over_limit_runs_without_a_slot() {
        let limiter = NonBlocking::new(1).unwrap();
        let _held = limiter.try_acquire().unwrap();

        let seen = limiter.run(|| usize::MAX, || limiter.in_flight());
        assert_eq!(seen, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_actual_concurrency() {
        let capacity = 100;
        let limiter = Arc::new(NonBlocking::new(capacity).unwrap());

        let mut handles = vec![];

        for _ in 0..capacity + 10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.try_acquire_owned() }));
        }

        // Permits stay alive in `results`, so no slot is handed out twice.
        let results = futures::future::join_all(handles).await;
        let admitted = results
            .iter()
            .filter(|r| matches!(r, Ok(Some(_))))
            .count();

        assert_eq!(admitted, capacity);
        assert_eq!(limiter.in_flight(), capacity);

        drop(results);
        assert_eq!(limiter.in_flight(), 0);
    }
}
