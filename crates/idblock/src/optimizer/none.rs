#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::{ConfigError, Error},
    factory::Policy,
    optimizer::{BlockOptimizer, StateCell, fetch_skipping_zero, validate_increment},
    source::AccessCallback,
};

/// An optimizer that does no batching at all.
///
/// Every call to [`BlockOptimizer::generate`] reaches the source exactly once,
/// plus one extra call at cold start if the source's first value is `0`.
///
/// ## Recommended When
/// - The increment size is `1`
/// - Gaps in the identifier space are unacceptable
///
/// ## See Also
/// - [`HiLoOptimizer`]
/// - [`PooledOptimizer`]
///
/// [`HiLoOptimizer`]: crate::HiLoOptimizer
/// [`PooledOptimizer`]: crate::PooledOptimizer
#[derive(Debug)]
pub struct NoopOptimizer {
    increment: i64,
    last_source_value: StateCell<Option<i64>>,
}

impl NoopOptimizer {
    /// Creates a non-batching optimizer.
    ///
    /// The increment size is only recorded; the source is expected to advance
    /// by one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIncrement`] if `increment < 1`.
    pub fn new(increment: i64) -> Result<Self, ConfigError> {
        let increment = validate_increment(increment)?;
        Ok(Self {
            increment,
            last_source_value: StateCell::new(None),
        })
    }
}

impl BlockOptimizer for NoopOptimizer {
    fn policy(&self) -> Policy {
        Policy::None
    }

    fn increment_size(&self) -> i64 {
        self.increment
    }

    fn last_source_value(&self) -> Result<Option<i64>, Error> {
        Ok(*self.last_source_value.lock()?)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>> {
        let mut last = self.last_source_value.lock()?;
        let value = fetch_skipping_zero(source)?;
        *last = Some(value);
        Ok(value)
    }
}
