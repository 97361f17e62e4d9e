//! Pairwise comparison types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::BookId;

/// One resolved pairwise comparison, as submitted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    /// First book of the pair (the one being placed).
    pub book_a: BookId,
    /// Second book of the pair (the existing candidate).
    pub book_b: BookId,
    /// The preferred book; one of the two above.
    pub winner: BookId,
}

impl ComparisonOutcome {
    /// Create a new comparison outcome.
    pub fn new(book_a: BookId, book_b: BookId, winner: BookId) -> Self {
        Self {
            book_a,
            book_b,
            winner,
        }
    }

    /// Whether this comparison mentions the given book on either side.
    pub fn involves(&self, book_id: BookId) -> bool {
        self.book_a == book_id || self.book_b == book_id
    }
}

/// Audit log row for one recorded comparison.
///
/// The log is append-only and purely historical; it is never replayed
/// to recompute rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// First book of the pair.
    pub book_a: BookId,
    /// Second book of the pair.
    pub book_b: BookId,
    /// The preferred book.
    pub winner: BookId,
    /// When the comparison was recorded.
    pub created_at: DateTime<Utc>,
}

impl ComparisonRecord {
    /// Create a record from an outcome and a timestamp.
    pub fn new(outcome: ComparisonOutcome, created_at: DateTime<Utc>) -> Self {
        Self {
            book_a: outcome.book_a,
            book_b: outcome.book_b,
            winner: outcome.winner,
            created_at,
        }
    }

    /// Whether this record mentions the given book on either side.
    pub fn involves(&self, book_id: BookId) -> bool {
        self.book_a == book_id || self.book_b == book_id
    }
}
