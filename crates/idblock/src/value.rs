use core::{fmt, str::FromStr};

use crate::error::{ConfigError, Error};

/// The integral type identifiers are handed out as.
///
/// Optimizers count in 64-bit internally; the value type only governs the
/// final narrowing step, which fails loudly instead of truncating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueType {
    /// `i16`
    Short,
    /// `i32`
    Integer,
    /// `i64`
    #[default]
    Long,
    /// `u32`
    UnsignedInteger,
    /// `u64`
    UnsignedLong,
}

impl ValueType {
    /// Every supported value type, narrowest signed first.
    pub const ALL: [Self; 5] = [
        Self::Short,
        Self::Integer,
        Self::Long,
        Self::UnsignedInteger,
        Self::UnsignedLong,
    ];

    /// The external name used in configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::UnsignedInteger => "unsigned_integer",
            Self::UnsignedLong => "unsigned_long",
        }
    }

    /// Narrows a raw optimizer value into this type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RangeOverflow`] if `value` is out of range for the
    /// type.
    pub fn narrow<E: fmt::Debug>(self, value: i64) -> Result<IdValue, Error<E>> {
        let narrowed = match self {
            Self::Short => i16::try_from(value).ok().map(IdValue::Short),
            Self::Integer => i32::try_from(value).ok().map(IdValue::Integer),
            Self::Long => Some(IdValue::Long(value)),
            Self::UnsignedInteger => u32::try_from(value).ok().map(IdValue::UnsignedInteger),
            Self::UnsignedLong => u64::try_from(value).ok().map(IdValue::UnsignedLong),
        };
        narrowed.ok_or_else(|| Error::overflow(value, self))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "i16" => Ok(Self::Short),
            "integer" | "int" | "i32" => Ok(Self::Integer),
            "long" | "i64" => Ok(Self::Long),
            "unsigned_integer" | "u32" => Ok(Self::UnsignedInteger),
            "unsigned_long" | "u64" => Ok(Self::UnsignedLong),
            _ => Err(ConfigError::UnsupportedValueType(s.to_owned())),
        }
    }
}

/// A generated identifier, already narrowed to its configured [`ValueType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum IdValue {
    /// A [`ValueType::Short`] identifier.
    Short(i16),
    /// A [`ValueType::Integer`] identifier.
    Integer(i32),
    /// A [`ValueType::Long`] identifier.
    Long(i64),
    /// A [`ValueType::UnsignedInteger`] identifier.
    UnsignedInteger(u32),
    /// A [`ValueType::UnsignedLong`] identifier.
    UnsignedLong(u64),
}

impl IdValue {
    /// The type this value was narrowed to.
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::Short(_) => ValueType::Short,
            Self::Integer(_) => ValueType::Integer,
            Self::Long(_) => ValueType::Long,
            Self::UnsignedInteger(_) => ValueType::UnsignedInteger,
            Self::UnsignedLong(_) => ValueType::UnsignedLong,
        }
    }

    /// Widens back to the optimizer's 64-bit domain.
    ///
    /// Lossless: every [`IdValue`] was produced from an `i64`.
    pub const fn to_i64(self) -> i64 {
        match self {
            Self::Short(v) => v as i64,
            Self::Integer(v) => v as i64,
            Self::Long(v) => v,
            Self::UnsignedInteger(v) => v as i64,
            #[allow(clippy::cast_possible_wrap)]
            Self::UnsignedLong(v) => v as i64,
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(v) => v.fmt(f),
            Self::Integer(v) => v.fmt(f),
            Self::Long(v) => v.fmt(f),
            Self::UnsignedInteger(v) => v.fmt(f),
            Self::UnsignedLong(v) => v.fmt(f),
        }
    }
}

/// Mismatch between a requested primitive and the [`IdValue`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected a {expected} identifier, found {found}")]
pub struct ValueTypeMismatch {
    /// The type the caller asked for.
    pub expected: ValueType,
    /// The type the identifier actually carries.
    pub found: ValueType,
}

macro_rules! impl_try_from_id_value {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl TryFrom<IdValue> for $ty {
                type Error = ValueTypeMismatch;

                fn try_from(value: IdValue) -> Result<Self, Self::Error> {
                    match value {
                        IdValue::$variant(v) => Ok(v),
                        other => Err(ValueTypeMismatch {
                            expected: ValueType::$variant,
                            found: other.value_type(),
                        }),
                    }
                }
            }

            impl From<$ty> for IdValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_try_from_id_value! {
    Short => i16,
    Integer => i32,
    Long => i64,
    UnsignedInteger => u32,
    UnsignedLong => u64,
}
