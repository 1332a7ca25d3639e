//! Resolution of generator parameters into an optimizer configuration.
//!
//! Generator definitions usually arrive as a flat string map that also carries
//! parameters meant for other layers (table names, sequence names, ...). Only
//! the keys below are read; everything else is ignored.
//!
//! | key                        | default                         |
//! |----------------------------|---------------------------------|
//! | `optimizer`                | see [`Policy::default_for`]     |
//! | `increment_size`           | `1`                             |
//! | `value_type`               | `long`                          |
//! | `prefer_pooled_values_lo`  | `false`                         |

use core::str::FromStr;

use crate::{
    error::ConfigError,
    factory::{Optimizer, OptimizerFactory, Policy},
    value::ValueType,
};

/// Names the optimizer policy explicitly.
pub const OPTIMIZER_PARAM: &str = "optimizer";
/// The block size.
pub const INCREMENT_PARAM: &str = "increment_size";
/// The identifier value type.
pub const VALUE_TYPE_PARAM: &str = "value_type";
/// Picks `pooled-lo` over `pooled` when no policy is named.
pub const PREFER_POOLED_LO_PARAM: &str = "prefer_pooled_values_lo";

/// The default [`INCREMENT_PARAM`] value.
pub const DEFAULT_INCREMENT_SIZE: i64 = 1;

/// Everything needed to build an [`Optimizer`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizerConfig {
    /// Explicit policy; resolved from the increment when absent.
    pub policy: Option<Policy>,
    /// The type identifiers are narrowed to.
    pub value_type: ValueType,
    /// The block size; must be at least `1` to build.
    pub increment_size: i64,
    /// Resolve to `pooled-lo` instead of `pooled` when no policy is named
    /// and the increment is above `1`.
    pub prefer_pooled_lo: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            policy: None,
            value_type: ValueType::default(),
            increment_size: DEFAULT_INCREMENT_SIZE,
            prefer_pooled_lo: false,
        }
    }
}

impl OptimizerConfig {
    /// Reads the optimizer keys out of a generator parameter map.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a known key carries a value that does not
    /// parse.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in params {
            let value = value.as_ref();
            match key.as_ref() {
                OPTIMIZER_PARAM => config.policy = Some(value.parse()?),
                INCREMENT_PARAM => config.increment_size = parse_param(INCREMENT_PARAM, value)?,
                VALUE_TYPE_PARAM => config.value_type = value.parse()?,
                PREFER_POOLED_LO_PARAM => {
                    config.prefer_pooled_lo = parse_param(PREFER_POOLED_LO_PARAM, value)?;
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// The explicit policy, or the default for this increment.
    pub fn resolved_policy(&self) -> Policy {
        self.policy
            .unwrap_or_else(|| Policy::default_for(self.increment_size, self.prefer_pooled_lo))
    }

    /// Builds the configured optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIncrement`] if the increment is below `1`.
    pub fn build(&self) -> Result<Optimizer, ConfigError> {
        OptimizerFactory::build(self.resolved_policy(), self.value_type, self.increment_size)
    }
}

fn parse_param<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidParameter {
            name: name.to_owned(),
            value: value.to_owned(),
        })
}
