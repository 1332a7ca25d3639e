use core::{fmt, str::FromStr};

#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::{
    error::{ConfigError, Error},
    optimizer::{BlockOptimizer, HiLoOptimizer, NoopOptimizer, PooledLoOptimizer, PooledOptimizer},
    source::AccessCallback,
    value::{IdValue, ValueType},
};

/// The block allocation policies an [`Optimizer`] can follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Policy {
    /// One source call per identifier.
    None,
    /// Source values are multiplied out into blocks locally.
    #[cfg_attr(feature = "serde", serde(rename = "hilo"))]
    HiLo,
    /// Source values are block upper bounds.
    Pooled,
    /// Source values are block lower bounds.
    PooledLo,
}

impl Policy {
    pub const ALL: [Self; 4] = [Self::None, Self::HiLo, Self::Pooled, Self::PooledLo];

    /// The external name used in configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HiLo => "hilo",
            Self::Pooled => "pooled",
            Self::PooledLo => "pooled-lo",
        }
    }

    /// Whether the backing source must advance by the increment size per
    /// call, rather than by one.
    pub const fn applies_increment_to_source(self) -> bool {
        matches!(self, Self::Pooled | Self::PooledLo)
    }

    /// The policy used when none is configured explicitly.
    ///
    /// No batching for an increment of `1` or less, otherwise `pooled`, or
    /// `pooled-lo` when `prefer_pooled_lo` is set.
    pub const fn default_for(increment: i64, prefer_pooled_lo: bool) -> Self {
        if increment <= 1 {
            Self::None
        } else if prefer_pooled_lo {
            Self::PooledLo
        } else {
            Self::Pooled
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "hilo" => Ok(Self::HiLo),
            "pooled" => Ok(Self::Pooled),
            "pooled-lo" | "pooled_lo" => Ok(Self::PooledLo),
            _ => Err(ConfigError::UnknownPolicy(s.to_owned())),
        }
    }
}

/// One concrete optimizer per [`Policy`].
#[derive(Debug)]
pub enum Strategy {
    /// See [`NoopOptimizer`].
    None(NoopOptimizer),
    /// See [`HiLoOptimizer`].
    HiLo(HiLoOptimizer),
    /// See [`PooledOptimizer`].
    Pooled(PooledOptimizer),
    /// See [`PooledLoOptimizer`].
    PooledLo(PooledLoOptimizer),
}

impl Strategy {
    fn new(policy: Policy, increment: i64) -> Result<Self, ConfigError> {
        Ok(match policy {
            Policy::None => Self::None(NoopOptimizer::new(increment)?),
            Policy::HiLo => Self::HiLo(HiLoOptimizer::new(increment)?),
            Policy::Pooled => Self::Pooled(PooledOptimizer::new(increment)?),
            Policy::PooledLo => Self::PooledLo(PooledLoOptimizer::new(increment)?),
        })
    }
}

macro_rules! dispatch {
    ($self:ident, $opt:ident => $body:expr) => {
        match $self {
            Strategy::None($opt) => $body,
            Strategy::HiLo($opt) => $body,
            Strategy::Pooled($opt) => $body,
            Strategy::PooledLo($opt) => $body,
        }
    };
}

impl BlockOptimizer for Strategy {
    fn policy(&self) -> Policy {
        dispatch!(self, opt => opt.policy())
    }

    fn increment_size(&self) -> i64 {
        dispatch!(self, opt => opt.increment_size())
    }

    fn last_source_value(&self) -> Result<Option<i64>, Error> {
        dispatch!(self, opt => opt.last_source_value())
    }

    fn generate<C: AccessCallback>(&self, source: &C) -> Result<i64, Error<C::Err>> {
        dispatch!(self, opt => opt.generate(source))
    }
}

/// A configured optimizer: a [`Strategy`] plus the [`ValueType`] its
/// identifiers are narrowed to.
///
/// One instance is meant to be shared (for example behind an `Arc`) by every
/// thread drawing identifiers from the same logical generator.
///
/// # Example
///
/// ```
/// use idblock::{IdValue, MemorySequence, OptimizerFactory};
///
/// let optimizer = OptimizerFactory::build_optimizer("hilo", "integer", 10).unwrap();
/// let source = MemorySequence::new(1, 1);
///
/// for expected in 1..=10 {
///     assert_eq!(optimizer.generate(&source).unwrap(), IdValue::Integer(expected));
/// }
/// // One round trip served all ten.
/// assert_eq!(source.issued(), 1);
/// ```
#[derive(Debug)]
pub struct Optimizer {
    strategy: Strategy,
    value_type: ValueType,
}

impl Optimizer {
    /// Returns the next identifier narrowed to the configured value type.
    ///
    /// # Errors
    ///
    /// - [`Error::Source`] if the source failed. Nothing advanced and the call
    ///   may be retried.
    /// - [`Error::RangeOverflow`] if the value does not fit the value type.
    ///   The value is lost; retrying yields the next one.
    /// - `Error::LockPoisoned` if the lock is poisoned (std mutex only).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(policy = %self.policy(), value_type = %self.value_type))
    )]
    pub fn generate<C: AccessCallback>(&self, source: &C) -> Result<IdValue, Error<C::Err>> {
        let raw = self.strategy.generate(source)?;
        self.value_type.narrow(raw)
    }

    /// The concrete optimizer behind this configuration.
    pub const fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// The type every generated identifier is narrowed to.
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The policy the strategy follows.
    pub fn policy(&self) -> Policy {
        self.strategy.policy()
    }

    /// The configured block size.
    pub fn increment_size(&self) -> i64 {
        self.strategy.increment_size()
    }

    /// See [`Policy::applies_increment_to_source`].
    pub fn applies_increment_to_source(&self) -> bool {
        self.strategy.applies_increment_to_source()
    }

    /// See [`BlockOptimizer::last_source_value`].
    ///
    /// # Errors
    ///
    /// May return an error if the underlying lock is poisoned.
    pub fn last_source_value(&self) -> Result<Option<i64>, Error> {
        self.strategy.last_source_value()
    }
}

/// Builds [`Optimizer`]s from configuration.
///
/// All validation happens here: an optimizer that was built never fails on
/// configuration grounds inside `generate`.
pub struct OptimizerFactory;

impl OptimizerFactory {
    /// Resolves a policy name, value type name and increment into an
    /// optimizer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown policy, an unsupported value
    /// type, or an increment below `1`.
    pub fn build_optimizer(
        policy: &str,
        value_type: &str,
        increment: i64,
    ) -> Result<Optimizer, ConfigError> {
        Self::build(policy.parse()?, value_type.parse()?, increment)
    }

    /// Typed counterpart of [`Self::build_optimizer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIncrement`] if `increment < 1`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug"))]
    pub fn build(
        policy: Policy,
        value_type: ValueType,
        increment: i64,
    ) -> Result<Optimizer, ConfigError> {
        let strategy = Strategy::new(policy, increment)?;
        #[cfg(feature = "tracing")]
        debug!(%policy, %value_type, increment, "building optimizer");
        Ok(Optimizer {
            strategy,
            value_type,
        })
    }
}
