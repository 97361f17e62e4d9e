//! Rank storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{
    BookId, ComparisonOutcome, ComparisonRecord, RankedBook, RankingEntry, RebuildRow, Stars,
    UserId,
};

/// Trait for rank storage backends.
///
/// Implementations must guarantee deterministic ordering of results.
/// All mutations go through a [`RankTx`] transaction: writes become
/// visible atomically on [`RankTx::commit`], and a transaction dropped
/// without committing is discarded.
#[async_trait]
pub trait RankStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;
    /// Transaction handle type.
    type Tx: RankTx<Error = Self::Error>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, Self::Error>;

    /// Fetch a user's placed entries joined to catalog metadata,
    /// ordered by ascending position.
    async fn ranked_books(&self, user_id: UserId) -> Result<Vec<RankedBook>, Self::Error>;

    /// Fetch one entry plus the user's placed entry count.
    async fn entry_with_total(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error>;

    /// Fetch every comparison mentioning a book, newest first.
    async fn comparisons_for(&self, book_id: BookId)
        -> Result<Vec<ComparisonRecord>, Self::Error>;
}

/// One open storage transaction.
///
/// Reads observe earlier writes in the same transaction. The engine's
/// multi-step mutations (shift then write, park then re-place) rely on
/// that to never expose a gapped or duplicated position sequence.
#[async_trait]
pub trait RankTx: Send {
    /// Error type for transaction operations.
    type Error: std::error::Error + Send + Sync;

    /// Fetch one entry plus the user's placed entry count.
    async fn entry_with_total(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error>;

    /// Min and max placed position of one (user, stars) group, `None`
    /// when the group has no placed members.
    async fn star_group_bounds(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<(u32, u32)>, Self::Error>;

    /// Max placed position among entries with strictly higher stars,
    /// `None` when no higher group exists.
    async fn max_position_above_stars(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<u32>, Self::Error>;

    /// Fetch every entry (placed and unplaced) joined to its title,
    /// ordered by book id.
    async fn entries_for_rebuild(&mut self, user_id: UserId)
        -> Result<Vec<RebuildRow>, Self::Error>;

    /// Shift placed positions in `lo..=hi` by `delta`, optionally
    /// excluding one book. `hi = None` leaves the range unbounded above.
    /// Returns the number of entries touched.
    async fn shift_positions(
        &mut self,
        user_id: UserId,
        lo: u32,
        hi: Option<u32>,
        delta: i32,
        exclude: Option<BookId>,
    ) -> Result<u64, Self::Error>;

    /// Insert a new entry. Fails if the (user, book) pair already exists.
    async fn insert_entry(&mut self, entry: &RankingEntry) -> Result<(), Self::Error>;

    /// Rewrite an existing entry's position and stars. Returns whether
    /// the entry existed.
    async fn update_entry(
        &mut self,
        user_id: UserId,
        book_id: BookId,
        position: u32,
        stars: Stars,
    ) -> Result<bool, Self::Error>;

    /// Bulk position reassignment across a user's entries (rebuild).
    /// Returns the number of entries touched.
    async fn assign_positions(
        &mut self,
        user_id: UserId,
        assignments: &[(BookId, u32)],
    ) -> Result<u64, Self::Error>;

    /// Append one comparison to the audit log.
    async fn append_comparison(&mut self, outcome: &ComparisonOutcome)
        -> Result<(), Self::Error>;

    /// Commit the transaction.
    async fn commit(self) -> Result<(), Self::Error>;
}

pub use memory::InMemoryRankStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRankStore;
