//! Core types for the ranking engine.

pub mod comparison;
pub mod entry;
pub mod stars;

pub use comparison::{ComparisonOutcome, ComparisonRecord};
pub use entry::{BookId, RankedBook, RankingEntry, RebuildRow, UserId, UNPLACED};
pub use stars::{Stars, StarsError};
