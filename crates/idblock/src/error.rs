use core::fmt;

use crate::value::ValueType;

/// A result type whose error defaults to a generation [`Error`] over an
/// infallible source.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors an optimizer can surface from [`generate`].
///
/// The generic parameter `E` is the error type of the [`AccessCallback`] the
/// optimizer was driven with. Source failures are carried through untouched in
/// [`Error::Source`] so callers can match on their own error type.
///
/// [`generate`]: crate::BlockOptimizer::try_generate
/// [`AccessCallback`]: crate::AccessCallback
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error<E = core::convert::Infallible>
where
    E: fmt::Debug,
{
    /// The backing source failed to hand out its next value.
    ///
    /// No optimizer state was advanced for the failed attempt, so calling
    /// `generate` again from the same optimizer is safe.
    #[error("source access failed: {0:?}")]
    Source(E),

    /// A produced value does not fit the configured [`ValueType`].
    ///
    /// The optimizer has already moved past `value`, so retrying skips
    /// another value instead of recovering this one.
    #[error("identifier {value} cannot be represented as {value_type}")]
    RangeOverflow {
        /// The 64-bit value (or, for arithmetic overflow, the block base) that
        /// failed to convert.
        value: i128,
        /// The type the value was narrowed to.
        value_type: ValueType,
    },

    /// The optimizer lock was poisoned by a panicking thread.
    ///
    /// When the `parking-lot` feature is enabled, mutexes do **not** poison,
    /// so this variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("optimizer lock poisoned")]
    LockPoisoned,
}

impl<E: fmt::Debug> Error<E> {
    pub(crate) fn overflow(value: impl Into<i128>, value_type: ValueType) -> Self {
        Self::RangeOverflow {
            value: value.into(),
            value_type,
        }
    }

    /// Returns `true` if the failure came from the backing source and the
    /// same optimizer may be driven again.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
use crate::optimizer::{MutexGuard, PoisonError};
#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T, E: fmt::Debug> From<PoisonError<MutexGuard<'_, T>>> for Error<E> {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

/// Errors raised while resolving an optimizer configuration.
///
/// These are only ever produced at build time, never from `generate`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The optimizer policy name is not one of `none`, `hilo`, `pooled` or
    /// `pooled-lo`.
    #[error("unknown optimizer policy: {0}")]
    UnknownPolicy(String),

    /// The block size must be at least one.
    #[error("increment size must be >= 1, got {0}")]
    InvalidIncrement(i64),

    /// The identifier type is not a supported integral type.
    #[error("unsupported identifier value type: {0}")]
    UnsupportedValueType(String),

    /// A generator parameter could not be parsed.
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameter { name: String, value: String },
}
