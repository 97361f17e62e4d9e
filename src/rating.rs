//! Derived rating calculation.

use serde::{Deserialize, Serialize};

/// Position-derived continuous rating.
///
/// Distinct from the coarse star rating an entry was filed under: this
/// score is recomputed from relative position on demand and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRating {
    /// Continuous score in [0, 10]; 10.0 for the best-ranked book.
    pub score: f64,
    /// Star equivalent in [0, 5] (score halved).
    pub stars: f64,
    /// The entry's 1-based rank position.
    pub position: u32,
    /// The user's placed entry count.
    pub total: u32,
}

impl DerivedRating {
    /// Compute the rating for a placed entry.
    ///
    /// ```text
    /// score = 10 * (1 - (position - 1) / max(total - 1, 1))
    /// ```
    ///
    /// Position 1 maps to 10.0, the last position of a multi-entry
    /// ranking to 0.0, and a lone entry to 10.0. Score is rounded to
    /// 2 decimals, stars to 1.
    pub fn from_position(position: u32, total: u32) -> Self {
        let span = total.saturating_sub(1).max(1) as f64;
        let raw = 10.0 * (1.0 - position.saturating_sub(1) as f64 / span);
        let score = round_to(raw, 2);
        let stars = round_to(score / 2.0, 1);
        Self {
            score,
            stars,
            position,
            total,
        }
    }
}

/// Round to a fixed number of decimal places.
fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
