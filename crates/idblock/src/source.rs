use core::fmt;

use portable_atomic::{AtomicI64, AtomicU64, Ordering};

use crate::optimizer::BlockOptimizer;

/// The backing source an optimizer draws blocks from.
///
/// Implementations wrap whatever shared counter is the arbiter of uniqueness:
/// a database sequence, a single-row hi/lo table updated in its own
/// transaction, or an in-memory counter. The only contract is that two calls,
/// from any thread or process, never return the same value, and that every
/// value is strictly greater than all values returned before it.
///
/// Any closure `Fn() -> Result<i64, E>` is a source.
///
/// # Example
///
/// ```
/// use idblock::{AccessCallback, MemorySequence};
///
/// let source = MemorySequence::new(1, 1);
/// assert_eq!(source.next_value(), Ok(1));
/// assert_eq!(source.next_value(), Ok(2));
///
/// let closure = || Ok::<_, std::io::Error>(7);
/// assert_eq!(closure.next_value().unwrap(), 7);
/// ```
pub trait AccessCallback {
    /// The error returned when the source cannot be reached.
    type Err: fmt::Debug;

    /// Atomically obtains the next value from the source.
    fn next_value(&self) -> Result<i64, Self::Err>;
}

impl<F, E> AccessCallback for F
where
    F: Fn() -> Result<i64, E>,
    E: fmt::Debug,
{
    type Err = E;

    fn next_value(&self) -> Result<i64, Self::Err> {
        self()
    }
}

/// An in-memory, lock-free source that starts at `initial` and advances by
/// `step` on every call.
///
/// Useful in tests and for single-process deployments where nothing else
/// shares the counter.
///
/// The sequence never wraps: a value is only handed out while the value after
/// it still fits in an `i64`. Past that point every call fails with
/// [`SequenceExhausted`].
#[derive(Debug)]
pub struct MemorySequence {
    #[cfg(feature = "cache-padded")]
    next: crossbeam_utils::CachePadded<AtomicI64>,
    #[cfg(not(feature = "cache-padded"))]
    next: AtomicI64,
    step: i64,
    /// Highest value handed out; only meaningful once `issued > 0`.
    last: AtomicI64,
    issued: AtomicU64,
}

/// A [`MemorySequence`] has run out of representable values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("memory sequence exhausted: {next} + {step} overflows i64")]
pub struct SequenceExhausted {
    /// The value that could not be issued.
    pub next: i64,
    /// The sequence step.
    pub step: i64,
}

impl MemorySequence {
    /// Creates a sequence whose first value is `initial`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not positive, since the source would no longer be
    /// strictly increasing.
    pub fn new(initial: i64, step: i64) -> Self {
        assert!(step > 0, "sequence step must be positive");
        Self {
            #[cfg(feature = "cache-padded")]
            next: crossbeam_utils::CachePadded::new(AtomicI64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            next: AtomicI64::new(initial),
            step,
            last: AtomicI64::new(i64::MIN),
            issued: AtomicU64::new(0),
        }
    }

    /// Creates a sequence that advances the way `optimizer` expects its
    /// source to: by the increment size for the pooled policies, by one
    /// otherwise.
    pub fn for_optimizer<O: BlockOptimizer>(initial: i64, optimizer: &O) -> Self {
        let step = if optimizer.applies_increment_to_source() {
            optimizer.increment_size()
        } else {
            1
        };
        Self::new(initial, step)
    }

    /// The amount the sequence advances per call.
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Number of values handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    /// The value the next call will return.
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Acquire)
    }

    /// The highest value issued so far, if any.
    ///
    /// Under concurrent callers this is the largest value any of them has
    /// been handed, which is the last one in sequence order.
    pub fn last_value(&self) -> Option<i64> {
        (self.issued() > 0).then(|| self.last.load(Ordering::Acquire))
    }
}

impl AccessCallback for MemorySequence {
    type Err = SequenceExhausted;

    fn next_value(&self) -> Result<i64, Self::Err> {
        let value = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                next.checked_add(self.step)
            })
            .map_err(|next| SequenceExhausted {
                next,
                step: self.step,
            })?;
        self.last.fetch_max(value, Ordering::AcqRel);
        self.issued.fetch_add(1, Ordering::AcqRel);
        Ok(value)
    }
}

/// Wraps a source and counts how often it is reached.
///
/// Mirrors the access statistics a table-backed generator keeps, and is the
/// easiest way to assert how many round trips an optimizer made.
#[derive(Debug)]
pub struct CountingSource<C> {
    inner: C,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl<C> CountingSource<C> {
    /// Wraps `inner` with both counters at zero.
    pub const fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Total invocations, successful or not.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    /// Invocations that returned an error.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// The wrapped source.
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwraps the source, discarding the counters.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: AccessCallback> AccessCallback for CountingSource<C> {
    type Err = C::Err;

    fn next_value(&self) -> Result<i64, Self::Err> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.inner.next_value().inspect_err(|_| {
            self.failures.fetch_add(1, Ordering::AcqRel);
        })
    }
}
