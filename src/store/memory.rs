//! In-memory rank store for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{RankStore, RankTx};
use crate::types::{
    BookId, ComparisonOutcome, ComparisonRecord, RankedBook, RankingEntry, RebuildRow, Stars,
    UserId,
};

/// Error type for the in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// A ranking entry already exists for this (user, book) pair.
    #[error("Ranking entry already exists for user {user_id}, book {book_id}")]
    DuplicateEntry {
        /// Owning user.
        user_id: UserId,
        /// Offending book.
        book_id: BookId,
    },
}

/// Catalog metadata read from the books collaborator.
#[derive(Debug, Clone)]
struct BookMeta {
    title: String,
    author: String,
}

/// The store's table set. Cloned wholesale into each transaction.
#[derive(Debug, Clone, Default)]
struct Tables {
    /// Catalog rows: title and author by book.
    books: BTreeMap<BookId, BookMeta>,
    /// Ranking entries by (user, book).
    entries: BTreeMap<(UserId, BookId), RankingEntry>,
    /// Append-only comparison log, oldest first.
    comparisons: Vec<ComparisonRecord>,
}

impl Tables {
    fn ranked_books(&self, user_id: UserId) -> Vec<RankedBook> {
        let mut rows: Vec<RankedBook> = self
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.is_placed())
            .filter_map(|e| {
                self.books.get(&e.book_id).map(|book| RankedBook {
                    book_id: e.book_id,
                    title: book.title.clone(),
                    author: book.author.clone(),
                    position: e.position,
                    stars: e.stars,
                })
            })
            .collect();
        rows.sort_by_key(|row| row.position);
        rows
    }

    fn entry_with_total(&self, user_id: UserId, book_id: BookId) -> Option<(RankingEntry, u32)> {
        let entry = self.entries.get(&(user_id, book_id)).cloned()?;
        let total = self
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.is_placed())
            .count() as u32;
        Some((entry, total))
    }

    fn comparisons_for(&self, book_id: BookId) -> Vec<ComparisonRecord> {
        // Newest first; the log is stored in insertion order.
        self.comparisons
            .iter()
            .rev()
            .filter(|c| c.involves(book_id))
            .cloned()
            .collect()
    }
}

/// In-memory rank store for testing.
///
/// Uses BTreeMaps for deterministic iteration order. Transactions work
/// on a copy of the tables and merge back only the rows they wrote, so
/// a dropped transaction leaves the store untouched and overlapping
/// transactions for distinct users keep each other's writes. Same-user
/// writers are serialized by the engine's per-user locks.
#[derive(Debug, Default)]
pub struct InMemoryRankStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRankStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog book the engine can join against.
    pub fn add_book(&self, book_id: BookId, title: &str, author: &str) {
        self.tables.write().books.insert(
            book_id,
            BookMeta {
                title: title.to_string(),
                author: author.to_string(),
            },
        );
    }

    /// Seed a ranking entry directly, bypassing the engine.
    pub fn add_entry(&self, entry: RankingEntry) {
        self.tables
            .write()
            .entries
            .insert((entry.user_id, entry.book_id), entry);
    }

    /// Number of ranking entries across all users.
    pub fn num_entries(&self) -> usize {
        self.tables.read().entries.len()
    }

    /// Number of recorded comparisons.
    pub fn num_comparisons(&self) -> usize {
        self.tables.read().comparisons.len()
    }
}

/// Open transaction over the in-memory store.
///
/// Reads and writes go through a private copy of the tables; commit
/// merges the touched entry rows and appended log entries back into
/// the shared tables, leaving rows other transactions committed in
/// the meantime alone.
#[derive(Debug)]
pub struct InMemoryTx {
    tables: Arc<RwLock<Tables>>,
    work: Tables,
    /// Entry keys this transaction wrote.
    touched: BTreeSet<(UserId, BookId)>,
    /// Comparison log length at `begin`; everything past it is ours.
    log_mark: usize,
}

#[async_trait]
impl RankStore for InMemoryRankStore {
    type Error = InMemoryError;
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, Self::Error> {
        let work = self.tables.read().clone();
        let log_mark = work.comparisons.len();
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            work,
            touched: BTreeSet::new(),
            log_mark,
        })
    }

    async fn ranked_books(&self, user_id: UserId) -> Result<Vec<RankedBook>, Self::Error> {
        Ok(self.tables.read().ranked_books(user_id))
    }

    async fn entry_with_total(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error> {
        Ok(self.tables.read().entry_with_total(user_id, book_id))
    }

    async fn comparisons_for(
        &self,
        book_id: BookId,
    ) -> Result<Vec<ComparisonRecord>, Self::Error> {
        Ok(self.tables.read().comparisons_for(book_id))
    }
}

#[async_trait]
impl RankTx for InMemoryTx {
    type Error = InMemoryError;

    async fn entry_with_total(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error> {
        Ok(self.work.entry_with_total(user_id, book_id))
    }

    async fn star_group_bounds(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<(u32, u32)>, Self::Error> {
        let mut bounds: Option<(u32, u32)> = None;
        for entry in self.work.entries.values() {
            if entry.user_id != user_id || !entry.is_placed() || entry.stars != stars {
                continue;
            }
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(entry.position), hi.max(entry.position)),
                None => (entry.position, entry.position),
            });
        }
        Ok(bounds)
    }

    async fn max_position_above_stars(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<u32>, Self::Error> {
        Ok(self
            .work
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.is_placed() && e.stars > stars)
            .map(|e| e.position)
            .max())
    }

    async fn entries_for_rebuild(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<RebuildRow>, Self::Error> {
        // BTreeMap iteration gives (user, book) key order, so rows come
        // out ordered by book id.
        Ok(self
            .work
            .entries
            .values()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                self.work.books.get(&e.book_id).map(|book| RebuildRow {
                    book_id: e.book_id,
                    title: book.title.clone(),
                    stars: e.stars,
                })
            })
            .collect())
    }

    async fn shift_positions(
        &mut self,
        user_id: UserId,
        lo: u32,
        hi: Option<u32>,
        delta: i32,
        exclude: Option<BookId>,
    ) -> Result<u64, Self::Error> {
        let mut touched = 0u64;
        for entry in self.work.entries.values_mut() {
            if entry.user_id != user_id || !entry.is_placed() {
                continue;
            }
            if entry.position < lo || hi.is_some_and(|hi| entry.position > hi) {
                continue;
            }
            if exclude == Some(entry.book_id) {
                continue;
            }
            entry.position = entry.position.saturating_add_signed(delta);
            entry.updated_at = Utc::now();
            self.touched.insert((entry.user_id, entry.book_id));
            touched += 1;
        }
        Ok(touched)
    }

    async fn insert_entry(&mut self, entry: &RankingEntry) -> Result<(), Self::Error> {
        let key = (entry.user_id, entry.book_id);
        if self.work.entries.contains_key(&key) {
            return Err(InMemoryError::DuplicateEntry {
                user_id: entry.user_id,
                book_id: entry.book_id,
            });
        }
        self.work.entries.insert(key, entry.clone());
        self.touched.insert(key);
        Ok(())
    }

    async fn update_entry(
        &mut self,
        user_id: UserId,
        book_id: BookId,
        position: u32,
        stars: Stars,
    ) -> Result<bool, Self::Error> {
        match self.work.entries.get_mut(&(user_id, book_id)) {
            Some(entry) => {
                entry.position = position;
                entry.stars = stars;
                entry.updated_at = Utc::now();
                self.touched.insert((user_id, book_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn assign_positions(
        &mut self,
        user_id: UserId,
        assignments: &[(BookId, u32)],
    ) -> Result<u64, Self::Error> {
        let mut touched = 0u64;
        for (book_id, position) in assignments {
            if let Some(entry) = self.work.entries.get_mut(&(user_id, *book_id)) {
                entry.position = *position;
                entry.updated_at = Utc::now();
                self.touched.insert((user_id, *book_id));
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn append_comparison(
        &mut self,
        outcome: &ComparisonOutcome,
    ) -> Result<(), Self::Error> {
        self.work
            .comparisons
            .push(ComparisonRecord::new(*outcome, Utc::now()));
        Ok(())
    }

    async fn commit(self) -> Result<(), Self::Error> {
        let mut tables = self.tables.write();
        for key in &self.touched {
            if let Some(entry) = self.work.entries.get(key) {
                tables.entries.insert(*key, entry.clone());
            }
        }
        tables
            .comparisons
            .extend(self.work.comparisons[self.log_mark..].iter().cloned());
        Ok(())
    }
}
