#[cfg(feature = "tracing")]
use tracing::{debug, instrument, warn};

use crate::{
    error::{ConfigError, Error},
    factory::Policy,
    optimizer::{BlockOptimizer, StateCell, fetch, validate_increment},
    source::AccessCallback,
    value::ValueType,
};

#[derive(Debug)]
struct PooledLoState {
    last_source_value: Option<i64>,
    /// Exclusive upper bound of the current block.
    upper: i64,
    cursor: i64,
}

/// A variant of [`PooledOptimizer`] that reads the source value as the
/// *inclusive lower* bound of a block of `increment` identifiers.
///
/// Every block, including the first, costs one source call. Source values
/// below `1` are clamped so that `0` and negatives are never handed out.
///
/// [`PooledOptimizer`]: crate::PooledOptimizer
#[derive(Debug)]
pub struct PooledLoOptimizer {
    increment: i64,
    state: StateCell<PooledLoState>,
}

impl PooledLoOptimizer {
    /// Creates a pooled-lo optimizer whose first `generate` fetches a block.
    ///
    /// The source must advance by `increment` per call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIncrement`] if `increment < 1`.
    pub fn new(increment: i64) -> Result<Self, ConfigError> {
        let increment = validate_increment(increment)?;
        Ok(Self {
            increment,
            state: StateCell::new(PooledLoState {
                last_source_value: None,
                upper: 0,
                cursor: 0,
            }),
        })
    }

    /// Fetches blocks until one reaches past `0`.
    ///
    /// A block lying entirely below `1` has nothing to hand out once clamped;
    /// using it anyway would issue `1` from a range the source never reserved.
    fn next_block<C: AccessCallback>(&self, source: &C) -> Result<(i64, i64), Error<C::Err>> {
        loop {
            let lower = fetch(source)?;
            let upper = lower.checked_add(self.increment).ok_or_else(|| {
                Error::overflow(i128::from(lower) + i128::from(self.increment), ValueType::Long)
            })?;
            if upper > 1 {
                return Ok((lower, upper));
            }
            #[cfg(feature = "tracing")]
            warn!(lower, upper, "pooled-lo block lies below 1, skipping it");
        }
    }
}

impl BlockOptimizer for PooledLoOptimizer {
    fn policy(&self) -> Policy {
        Policy::PooledLo
    }

    fn increment_size(&self) -> i64 {
        self.increment
    }

    fn last_source_value(&self) -> Result<Option<i64>, Error> {
        Ok(self.state.lock()?.last_source_value)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>> {
        let mut state = self.state.lock()?;
        if state.last_source_value.is_none() || state.cursor >= state.upper {
            let (lower, upper) = self.next_block(source)?;
            #[cfg(feature = "tracing")]
            debug!(lower, upper, "pooled-lo block refilled");
            state.last_source_value = Some(lower);
            state.upper = upper;
            state.cursor = lower.max(1);
        }
        let value = state.cursor;
        state.cursor += 1;
        Ok(value)
    }
}
