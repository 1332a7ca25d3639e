use crate::{
    error::{ConfigError, Error},
    factory::Policy,
    source::AccessCallback,
};

/// A minimal interface shared by every block optimizer.
///
/// Implementations are safe to share across threads: all state lives behind
/// one lock, and a call to the source that refills a block is made while that
/// lock is held.
pub trait BlockOptimizer {
    /// The policy this optimizer implements.
    fn policy(&self) -> Policy;

    /// The configured block size.
    fn increment_size(&self) -> i64;

    /// Whether the backing source is expected to advance by
    /// [`Self::increment_size`] per call (`true`) or by one (`false`).
    ///
    /// A table-backed source uses this to decide how far to bump its stored
    /// value.
    fn applies_increment_to_source(&self) -> bool {
        self.policy().applies_increment_to_source()
    }

    /// The most recent value obtained from the source, or `None` before the
    /// first block was fetched.
    ///
    /// # Errors
    ///
    /// May return an error if the underlying lock is poisoned.
    fn last_source_value(&self) -> Result<Option<i64>, Error>;

    /// Produces the next raw 64-bit identifier, calling `source` zero or more
    /// times.
    ///
    /// # Errors
    ///
    /// - [`Error::Source`] if `source` failed; no state was advanced.
    /// - [`Error::RangeOverflow`] if block arithmetic left the 64-bit range.
    /// - `Error::LockPoisoned` if the lock is poisoned (std mutex only).
    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>>;
}

/// Fetches one value from `source`, wrapping the failure verbatim.
#[inline]
pub(crate) fn fetch<C: AccessCallback>(source: &C) -> Result<i64, Error<C::Err>> {
    source.next_value().map_err(Error::Source)
}

/// Fetches a value, transparently skipping a leading `0` once.
///
/// Legacy table sources start counting at zero, which is not a usable
/// identifier. A monotonic source never yields zero again, so no flag is
/// needed to remember the skip.
pub(crate) fn fetch_skipping_zero<C: AccessCallback>(
    source: &C,
) -> Result<i64, Error<C::Err>> {
    match fetch(source)? {
        0 => fetch(source),
        value => Ok(value),
    }
}

/// Rejects block sizes below one.
pub(crate) fn validate_increment(increment: i64) -> Result<i64, ConfigError> {
    if increment < 1 {
        Err(ConfigError::InvalidIncrement(increment))
    } else {
        Ok(increment)
    }
}
