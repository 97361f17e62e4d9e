//! Ranking entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stars::Stars;

/// Unique identifier for a user.
///
/// Wraps the catalog collaborator's integer key and implements `Ord`
/// for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Create a new UserId from a raw key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a book.
///
/// Wraps the catalog collaborator's integer key and implements `Ord`
/// for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookId(i64);

impl BookId {
    /// Create a new BookId from a raw key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BookId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Sentinel position for an entry that exists but has not been placed yet.
pub const UNPLACED: u32 = 0;

/// One user's ranking slot for one finished book.
///
/// Positions are 1-based and dense per user: a user's placed entries
/// always occupy exactly `1..=N`. Position [`UNPLACED`] marks an entry
/// created before placement (a book filed as finished without going
/// through the wizard yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Owning user.
    pub user_id: UserId,
    /// Ranked book.
    pub book_id: BookId,
    /// 1-based rank position; lower is better. 0 = unplaced sentinel.
    pub position: u32,
    /// Star rating the entry was filed under.
    pub stars: Stars,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RankingEntry {
    /// Create a new ranking entry.
    pub fn new(
        user_id: UserId,
        book_id: BookId,
        position: u32,
        stars: Stars,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            book_id,
            position,
            stars,
            updated_at,
        }
    }

    /// Create an entry at the unplaced sentinel position.
    pub fn unplaced(user_id: UserId, book_id: BookId, stars: Stars, updated_at: DateTime<Utc>) -> Self {
        Self::new(user_id, book_id, UNPLACED, stars, updated_at)
    }

    /// Whether this entry holds a real rank position.
    pub fn is_placed(&self) -> bool {
        self.position > UNPLACED
    }
}

// Identity is the (user, book) pair; position and stars mutate over the
// entry's lifetime.
impl PartialEq for RankingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.book_id == other.book_id
    }
}

impl Eq for RankingEntry {}

impl PartialOrd for RankingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankingEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.user_id, self.book_id).cmp(&(other.user_id, other.book_id))
    }
}

/// One row of a user's ordered ranking list, joined to catalog metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBook {
    /// Ranked book.
    pub book_id: BookId,
    /// Book title from the catalog.
    pub title: String,
    /// Book author from the catalog.
    pub author: String,
    /// 1-based rank position.
    pub position: u32,
    /// Star rating the entry was filed under.
    pub stars: Stars,
}

/// Rebuild input row: one entry joined to its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildRow {
    /// Ranked book.
    pub book_id: BookId,
    /// Book title from the catalog; the within-group sort key.
    pub title: String,
    /// Star rating the entry was filed under.
    pub stars: Stars,
}
