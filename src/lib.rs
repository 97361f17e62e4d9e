//! # shelfrank
//!
//! Comparison-driven ranking for personal book shelves.
//!
//! The ranking engine answers one question:
//!
//! > Given how this reader judged a handful of head-to-head matchups, where does
//! > the book belong in their shelf order?
//!
//! ## Core Contract
//!
//! 1. Keep one dense strict total order per user: placed entries occupy
//!    positions `1..=N` exactly, no gaps, no duplicates
//! 2. Keep star groups contiguous: more stars always ranks above fewer stars
//! 3. Derive the 0-10 rating from position alone, never store it
//!
//! ## Architecture
//!
//! ```text
//! start_wizard → ComparisonPrompts → (client resolves) → finalize
//!       ↓                                                    ↓
//!    RankStore (Postgres or Memory) ← reposition / rebuild ──┘
//! ```
//!
//! [`RankingEngine::start_wizard`] inspects the user's current order and either
//! places the book immediately (first entry, or a star group of its own) or
//! returns a bisection-style plan of prompts drawn from the same-star group.
//! The client walks the prompts, derives a final position, and calls
//! [`RankingEngine::finalize`], which records the comparisons and splices the
//! book in. [`RankingEngine::reposition`] moves a single book as an escape
//! hatch, and [`RankingEngine::rebuild`] reconstructs the whole order.
//!
//! ## Ordering Guarantees
//!
//! - Every mutation shifts neighbors and writes the entry inside one storage
//!   transaction, under a per-user lock
//! - Rebuild is deterministic: same entries → same order (stars descending,
//!   then title, then book id)
//! - Position 0 is a sentinel for entries that exist but are not yet placed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
mod locks;
pub mod rating;
pub mod store;
pub mod types;
pub mod wizard;

// Re-exports
pub use engine::{RankingEngine, RankingError};
pub use rating::DerivedRating;
pub use store::{InMemoryRankStore, RankStore, RankTx};
pub use types::{
    BookId, ComparisonOutcome, ComparisonRecord, RankedBook, RankingEntry, RebuildRow, Stars,
    StarsError, UserId, UNPLACED,
};
pub use wizard::{
    plan_comparisons, question_count, ComparisonPrompt, WizardPolicy, WizardResponse,
    DEFAULT_COMPARISON_CAP,
};

#[cfg(feature = "postgres")]
pub use store::postgres::{
    PostgresConfig, PostgresError, PostgresRankStore, PostgresTx, COMPARISONS_BOOKS_INDEX,
    COMPARISONS_TABLE_SCHEMA, RANKINGS_POSITION_INDEX, RANKINGS_TABLE_SCHEMA,
};
