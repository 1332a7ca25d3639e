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
struct PooledState {
    /// Exclusive upper bound of the current block.
    upper: Option<i64>,
    cursor: i64,
}

/// A pooled optimizer.
///
/// The source itself advances by `increment` per call, so each value it
/// returns is the exclusive upper bound of a freshly reserved block. Because
/// the stored value is the block boundary, other applications reading the same
/// sequence see a meaningful high-water mark.
///
/// Bootstrapping costs two source calls (lower then upper bound); every later
/// block costs one.
///
/// ## Caveats
/// If the source advances by something other than `increment`, the result is
/// gaps, never duplicates. This is not detected.
///
/// ## See Also
/// - [`PooledLoOptimizer`]
/// - [`HiLoOptimizer`]
///
/// [`PooledLoOptimizer`]: crate::PooledLoOptimizer
/// [`HiLoOptimizer`]: crate::HiLoOptimizer
#[derive(Debug)]
pub struct PooledOptimizer {
    increment: i64,
    state: StateCell<PooledState>,
}

impl PooledOptimizer {
    /// Creates a pooled optimizer whose first `generate` bootstraps a block
    /// from two source calls.
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
            state: StateCell::new(PooledState {
                upper: None,
                cursor: 0,
            }),
        })
    }
}

impl BlockOptimizer for PooledOptimizer {
    fn policy(&self) -> Policy {
        Policy::Pooled
    }

    fn increment_size(&self) -> i64 {
        self.increment
    }

    fn last_source_value(&self) -> Result<Option<i64>, Error> {
        Ok(self.state.lock()?.upper)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>> {
        let mut guard = self.state.lock()?;
        let state = &mut *guard;
        let value = match state.upper {
            None => {
                let lower = fetch(source)?;
                let upper = fetch(source)?;
                #[cfg(feature = "tracing")]
                if lower < 1 {
                    warn!(
                        lower,
                        "pooled optimizer source reported an initial value below 1; \
                         starting the sequence at 1 or greater is recommended"
                    );
                }
                #[cfg(feature = "tracing")]
                debug!(lower, upper, "pooled block bootstrapped");
                state.upper = Some(upper);
                lower
            }
            Some(upper) if state.cursor >= upper => {
                let upper = fetch(source)?;
                #[cfg(feature = "tracing")]
                debug!(upper, increment = self.increment, "pooled block refilled");
                state.upper = Some(upper);
                // Left exhausted if the lower bound underflows.
                state.cursor = upper;
                upper.checked_sub(self.increment).ok_or_else(|| {
                    Error::overflow(i128::from(upper) - i128::from(self.increment), ValueType::Long)
                })?
            }
            Some(_) => state.cursor,
        };
        // `value < upper` for any monotonic source, so this never saturates.
        state.cursor = value.saturating_add(1);
        Ok(value)
    }
}
