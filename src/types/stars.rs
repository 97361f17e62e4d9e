//! Half-step star ratings.
//!
//! Ratings are stored as integer half-steps (`0..=10`) so that two entries
//! filed under the same star value always compare equal. Star-group
//! membership is decided by exact equality, which raw floats cannot give.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of half-steps in the maximum rating (5.0 stars).
const MAX_HALF_STEPS: u8 = 10;

/// Error type for star rating construction.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum StarsError {
    /// Value outside the 0.0 to 5.0 star range.
    #[error("Star value {0} outside the 0.0..=5.0 range")]
    OutOfRange(f32),
    /// Value not on the half-star grid.
    #[error("Star value {0} is not a multiple of 0.5")]
    OffGrid(f32),
}

/// A star rating on the half-step grid: 0.0, 0.5, ... 5.0.
///
/// Stored as half-steps so equality and ordering are exact. Serializes
/// as the fractional star value (e.g. `4.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stars(u8);

impl Stars {
    /// The zero rating.
    pub const ZERO: Stars = Stars(0);
    /// The maximum rating (5.0 stars).
    pub const MAX: Stars = Stars(MAX_HALF_STEPS);

    /// Parse a fractional star value, validating range and grid.
    pub fn from_f32(value: f32) -> Result<Self, StarsError> {
        if !(0.0..=5.0).contains(&value) {
            return Err(StarsError::OutOfRange(value));
        }
        let doubled = value * 2.0;
        if doubled.fract() != 0.0 {
            return Err(StarsError::OffGrid(value));
        }
        Ok(Self(doubled as u8))
    }

    /// Build a rating from raw half-steps (0..=10).
    pub fn from_half_steps(half_steps: u8) -> Result<Self, StarsError> {
        if half_steps > MAX_HALF_STEPS {
            return Err(StarsError::OutOfRange(half_steps as f32 / 2.0));
        }
        Ok(Self(half_steps))
    }

    /// Get the fractional star value.
    pub fn as_f32(&self) -> f32 {
        self.0 as f32 / 2.0
    }

    /// Get the raw half-step count.
    pub fn half_steps(&self) -> u8 {
        self.0
    }
}

impl Default for Stars {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Stars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f32())
    }
}

impl Serialize for Stars {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f32(self.as_f32())
    }
}

impl<'de> Deserialize<'de> for Stars {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f32::deserialize(deserializer)?;
        Stars::from_f32(value).map_err(serde::de::Error::custom)
    }
}
