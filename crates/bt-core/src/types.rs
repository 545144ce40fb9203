//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and analysis options.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The rounding precision was out of range.
    #[error(
        "round decimals must be between {min} and {max}, got {value}",
        min = RoundDecimals::MIN.0,
        max = RoundDecimals::MAX.0
    )]
    RoundDecimalsOutOfRange { value: i32 },

    /// The point-event weight was out of range.
    #[error(
        "event weight must be between {min} and {max}, got {value}",
        min = EventWeight::MIN.0,
        max = EventWeight::MAX.0
    )]
    EventWeightOutOfRange { value: f64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated behavior code from the ethogram.
    BehaviorCode, "behavior code"
);

define_string_id!(
    /// A validated observation identifier.
    ///
    /// Observation IDs must be non-empty; they key the project's observations
    /// and label rows and columns of agreement matrices.
    ObservationId, "observation ID"
);

/// Number of decimal places timestamps are rounded to before comparison.
///
/// Valid range is \[-5, 3\]; negative values round to tens, hundreds and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoundDecimals(i32);

impl RoundDecimals {
    pub const MIN: Self = Self(-5);
    pub const MAX: Self = Self(3);

    pub const fn new(value: i32) -> Result<Self, ValidationError> {
        if value < Self::MIN.0 || value > Self::MAX.0 {
            return Err(ValidationError::RoundDecimalsOutOfRange { value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for RoundDecimals {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<i32> for RoundDecimals {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for RoundDecimals {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

/// Weight given to each point-event instant in duration-weighted agreement.
///
/// Valid range is \[0, 10\]; NaN is rejected.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct EventWeight(f64);

impl EventWeight {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(10.0);

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(Self::MIN.0..=Self::MAX.0).contains(&value) {
            return Err(ValidationError::EventWeightOutOfRange { value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for EventWeight {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for EventWeight {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for EventWeight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
