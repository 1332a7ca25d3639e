#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::{
    error::{ConfigError, Error},
    factory::Policy,
    optimizer::{BlockOptimizer, StateCell, fetch_skipping_zero, validate_increment},
    source::AccessCallback,
    value::ValueType,
};

#[derive(Debug)]
struct HiLoState {
    hi: Option<i64>,
    /// 1-based position inside the current block. Unsigned so the
    /// exhausted marker `increment + 1` fits for any increment.
    lo: u64,
}

/// A hi/lo optimizer.
///
/// Each source value ("hi") is expanded locally into `increment` identifiers
/// via `(hi - 1) * increment + lo` with `lo` in `1..=increment`. The source is
/// reached once per block.
///
/// ## Caveats
/// Every process sharing the source must use the same increment. A mismatch
/// silently produces overlapping ranges and cannot be detected here.
///
/// ## See Also
/// - [`PooledOptimizer`]
/// - [`NoopOptimizer`]
///
/// [`PooledOptimizer`]: crate::PooledOptimizer
/// [`NoopOptimizer`]: crate::NoopOptimizer
#[derive(Debug)]
pub struct HiLoOptimizer {
    increment: i64,
    state: StateCell<HiLoState>,
}

impl HiLoOptimizer {
    /// Creates a hi/lo optimizer whose first `generate` fetches a block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIncrement`] if `increment < 1`.
    pub fn new(increment: i64) -> Result<Self, ConfigError> {
        let increment = validate_increment(increment)?;
        Ok(Self {
            increment,
            state: StateCell::new(HiLoState {
                hi: None,
                lo: increment.unsigned_abs() + 1,
            }),
        })
    }

    fn compose<E: core::fmt::Debug>(&self, hi: i64, lo: u64) -> Result<i64, Error<E>> {
        let value = (i128::from(hi) - 1) * i128::from(self.increment) + i128::from(lo);
        i64::try_from(value).map_err(|_| Error::overflow(value, ValueType::Long))
    }
}

impl BlockOptimizer for HiLoOptimizer {
    fn policy(&self) -> Policy {
        Policy::HiLo
    }

    fn increment_size(&self) -> i64 {
        self.increment
    }

    fn last_source_value(&self) -> Result<Option<i64>, Error> {
        Ok(self.state.lock()?.hi)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>> {
        let mut guard = self.state.lock()?;
        let state = &mut *guard;
        let (hi, lo) = match state.hi {
            Some(hi) if state.lo <= self.increment.unsigned_abs() => (hi, state.lo),
            _ => {
                let hi = fetch_skipping_zero(source)?;
                #[cfg(feature = "tracing")]
                debug!(hi, increment = self.increment, "hilo block refilled");
                state.hi = Some(hi);
                (hi, 1)
            }
        };
        state.lo = lo + 1;
        drop(guard);
        self.compose(hi, lo)
    }
}
