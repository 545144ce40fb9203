//! Fixed-precision decimal seconds.
//!
//! Event times are stored as an integer count of milliseconds so that parity
//! counting, duplicate detection and interval joins can rely on exact
//! equality. Values cross the persistence boundary as decimal strings
//! (`"12.345"`), never as binary floats.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RoundDecimals;

/// Number of decimal places carried by [`Seconds`].
pub const PRECISION: u32 = 3;

const MILLIS_PER_SECOND: i64 = 10_i64.pow(PRECISION);

/// Errors from parsing a decimal time value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    /// The input was empty or only a sign.
    #[error("empty time value")]
    Empty,

    /// The input contained something other than an optional sign, digits and one dot.
    #[error("invalid decimal time value: {0:?}")]
    Invalid(String),

    /// The value does not fit in the millisecond range.
    #[error("time value out of range: {0:?}")]
    OutOfRange(String),
}

/// A signed decimal number of seconds with millisecond resolution.
///
/// Used both for instants on an observation timeline and for durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seconds(i64);

impl Seconds {
    /// Zero seconds.
    pub const ZERO: Self = Self(0);

    /// The smallest representable step (one millisecond).
    pub const EPSILON: Self = Self(1);

    /// Creates a value from a count of milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a value from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * MILLIS_PER_SECOND)
    }

    /// Returns the value as a count of milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the value as floating point seconds, for statistics only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MILLIS_PER_SECOND as f64
    }

    /// Adds `rhs`, or `None` if the sum does not fit.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(millis) => Some(Self(millis)),
            None => None,
        }
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Rounds to the given number of decimal places, half to even.
    ///
    /// Negative places round to tens, hundreds and so on.
    #[must_use]
    pub fn round(self, decimals: RoundDecimals) -> Self {
        let places = i64::from(decimals.value());
        // places <= PRECISION, so the exponent is never negative
        let exponent = u32::try_from(i64::from(PRECISION) - places).unwrap_or(0);
        let unit = 10_i64.pow(exponent);
        Self(round_half_even(self.0, unit))
    }
}

/// Rounds `value` to a multiple of `unit`, ties to the even multiple.
const fn round_half_even(value: i64, unit: i64) -> i64 {
    if unit <= 1 {
        return value;
    }
    let quotient = value.div_euclid(unit);
    let remainder = value.rem_euclid(unit);
    let twice = remainder * 2;
    let rounded = if twice < unit {
        quotient
    } else if twice > unit || quotient % 2 != 0 {
        quotient + 1
    } else {
        quotient
    };
    rounded * unit
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let scale = MILLIS_PER_SECOND.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:03}",
            magnitude / scale,
            magnitude % scale
        )
    }
}

impl FromStr for Seconds {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if body.is_empty() || body == "." {
            return Err(TimeParseError::Empty);
        }

        let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(TimeParseError::Invalid(s.to_string()));
        }

        let out_of_range = || TimeParseError::OutOfRange(s.to_string());
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };

        let digits = PRECISION as usize;
        let (kept, rest) = fraction.split_at(fraction.len().min(digits));
        let mut millis: i64 = format!("{kept:0<digits$}").parse().map_err(|_| out_of_range())?;

        // Extra digits round half to even on the last kept millisecond.
        if let Some(first) = rest.bytes().next() {
            let tail_nonzero = rest.bytes().skip(1).any(|b| b != b'0');
            let round_up = match first {
                b'6'..=b'9' => true,
                b'5' => tail_nonzero || millis % 2 != 0,
                _ => false,
            };
            if round_up {
                millis += 1;
            }
        }

        let total = whole
            .checked_mul(MILLIS_PER_SECOND)
            .and_then(|w| w.checked_add(millis))
            .ok_or_else(out_of_range)?;
        Ok(Self(if negative { -total } else { total }))
    }
}

impl Add for Seconds {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Seconds {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Seconds {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Seconds {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Seconds {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Seconds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Seconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(SecondsVisitor)
    }
}

struct SecondsVisitor;

impl serde::de::Visitor<'_> for SecondsVisitor {
    type Value = Seconds;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer number of seconds")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Seconds, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Seconds, E> {
        v.checked_mul(MILLIS_PER_SECOND)
            .map(Seconds)
            .ok_or_else(|| E::custom(format!("time value out of range: {v}")))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Seconds, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(format!("time value out of range: {v}")))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Seconds, E> {
        Err(E::custom(format!(
            "time value {v} must be a decimal string, not a binary float"
        )))
    }
}
