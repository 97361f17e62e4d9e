//! Ranking engine: wizard orchestration, placement, repositioning, rebuild.
//!
//! Every position-mutating operation runs under a per-user advisory lock
//! and inside one storage transaction, so the dense position sequence is
//! never observed half-shifted.

use std::sync::Arc;

use chrono::Utc;

use crate::locks::UserLocks;
use crate::rating::DerivedRating;
use crate::store::{RankStore, RankTx};
use crate::types::{
    BookId, ComparisonOutcome, ComparisonRecord, RankedBook, RankingEntry, Stars, UserId, UNPLACED,
};
use crate::wizard::{plan_comparisons, WizardPolicy, WizardResponse};

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    /// Store error.
    #[error("Store error: {0}")]
    Store(String),
}

impl RankingError {
    /// Create a store error from any backend error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }
}

/// Per-user ranking engine over a storage backend.
///
/// ## Ordering model
///
/// A user's placed entries always occupy positions `1..=N` with no gaps
/// or duplicates, and star groups stay contiguous: a book never sits
/// below one with fewer stars unless the user forces it through
/// [`reposition`](Self::reposition).
///
/// ## Flow
///
/// [`start_wizard`](Self::start_wizard) plans pairwise questions against
/// the same-star group (or places the book outright when none are
/// needed), the client resolves them and derives a final position, and
/// [`finalize`](Self::finalize) commits it. [`rebuild`](Self::rebuild)
/// reconstructs a user's whole order from scratch.
pub struct RankingEngine<S: RankStore> {
    store: Arc<S>,
    policy: WizardPolicy,
    locks: UserLocks,
}

impl<S: RankStore> RankingEngine<S> {
    /// Create a new engine over a storage backend.
    pub fn new(store: Arc<S>, policy: WizardPolicy) -> Self {
        Self {
            store,
            policy,
            locks: UserLocks::new(),
        }
    }

    /// Create an engine with the default wizard policy.
    pub fn with_default_policy(store: Arc<S>) -> Self {
        Self::new(store, WizardPolicy::default())
    }

    /// Get the wizard policy.
    pub fn policy(&self) -> &WizardPolicy {
        &self.policy
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open a ranking session for a newly finished (or re-rated) book.
    ///
    /// Decides whether comparisons are needed at all:
    /// - first placed entry: placed at position 1 outright
    /// - no same-star peers: parked at the sentinel and folded in by a
    ///   full rebuild
    /// - otherwise: returns comparison prompts against the same-star
    ///   group, read-only
    pub async fn start_wizard(
        &self,
        book_id: BookId,
        stars: Stars,
        user_id: UserId,
    ) -> Result<WizardResponse, RankingError> {
        let _guard = self.locks.acquire(user_id).await;

        let ranked = self
            .store
            .ranked_books(user_id)
            .await
            .map_err(RankingError::from_store)?;
        let total_ranked = ranked.iter().filter(|b| b.book_id != book_id).count() as u32;

        // First placed entry goes straight to the top slot.
        if total_ranked == 0 {
            let mut tx = self.store.begin().await.map_err(RankingError::from_store)?;
            self.write_entry(&mut tx, user_id, book_id, 1, stars).await?;
            tx.commit().await.map_err(RankingError::from_store)?;
            tracing::debug!(user = %user_id, book = %book_id, "first entry placed without comparisons");
            return Ok(WizardResponse {
                book_id,
                stars,
                comparisons: Vec::new(),
                total_ranked: 0,
                same_star_count: None,
            });
        }

        // Candidates come from exactly this star group; comparing across
        // groups could contradict the star ordering.
        let candidates: Vec<RankedBook> = ranked
            .iter()
            .filter(|b| b.stars == stars && b.book_id != book_id)
            .cloned()
            .collect();

        if candidates.is_empty() {
            // A group with no peers needs no questions: park the entry at
            // the sentinel and let a full rebuild fold it into its slot.
            let mut tx = self.store.begin().await.map_err(RankingError::from_store)?;
            self.write_entry(&mut tx, user_id, book_id, UNPLACED, stars).await?;
            let assigned = self.rebuild_in_tx(&mut tx, user_id).await?;
            tx.commit().await.map_err(RankingError::from_store)?;
            tracing::debug!(
                user = %user_id,
                book = %book_id,
                entries = assigned,
                "no same-star peers, placed via rebuild"
            );
            return Ok(WizardResponse {
                book_id,
                stars,
                comparisons: Vec::new(),
                total_ranked,
                same_star_count: Some(0),
            });
        }

        let same_star_count = candidates.len() as u32;
        let comparisons = plan_comparisons(&candidates, &self.policy);
        tracing::debug!(
            user = %user_id,
            book = %book_id,
            candidates = same_star_count,
            questions = comparisons.len(),
            "wizard comparisons planned"
        );

        Ok(WizardResponse {
            book_id,
            stars,
            comparisons,
            total_ranked,
            same_star_count: Some(same_star_count),
        })
    }

    /// Commit a wizard's outcome: record the comparisons and place the
    /// book at its final position.
    ///
    /// The requested position is clamped into the star group's legal
    /// range (`[min, max + 1]` for a populated group; directly after the
    /// next-higher group otherwise). Re-finalizing an already placed book
    /// moves it. Returns the user's full ordered ranking list.
    pub async fn finalize(
        &self,
        book_id: BookId,
        final_position: u32,
        stars: Stars,
        comparisons: &[ComparisonOutcome],
        user_id: UserId,
    ) -> Result<Vec<RankedBook>, RankingError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut tx = self.store.begin().await.map_err(RankingError::from_store)?;

        for outcome in comparisons {
            tx.append_comparison(outcome)
                .await
                .map_err(RankingError::from_store)?;
        }

        // Re-finalizing a placed book moves it: lift it out and close the
        // gap, then the rest behaves like a fresh insert.
        let existing = tx
            .entry_with_total(user_id, book_id)
            .await
            .map_err(RankingError::from_store)?;
        let had_entry = existing.is_some();
        if let Some((entry, _)) = existing {
            if entry.is_placed() {
                tx.update_entry(user_id, book_id, UNPLACED, stars)
                    .await
                    .map_err(RankingError::from_store)?;
                tx.shift_positions(user_id, entry.position + 1, None, -1, Some(book_id))
                    .await
                    .map_err(RankingError::from_store)?;
            }
        }

        let target = self
            .clamp_into_star_group(&mut tx, user_id, final_position, stars)
            .await?;
        if target != final_position {
            tracing::warn!(
                user = %user_id,
                book = %book_id,
                requested = final_position,
                clamped = target,
                "final position clamped to star group range"
            );
        }

        // Shift first, then write, so the sequence never holds two
        // entries at one position, even transiently.
        tx.shift_positions(user_id, target, None, 1, Some(book_id))
            .await
            .map_err(RankingError::from_store)?;
        if had_entry {
            tx.update_entry(user_id, book_id, target, stars)
                .await
                .map_err(RankingError::from_store)?;
        } else {
            let entry = RankingEntry::new(user_id, book_id, target, stars, Utc::now());
            tx.insert_entry(&entry)
                .await
                .map_err(RankingError::from_store)?;
        }

        tx.commit().await.map_err(RankingError::from_store)?;
        tracing::debug!(user = %user_id, book = %book_id, position = target, "ranking entry placed");

        self.ranked_books(user_id).await
    }

    /// Move one placed book to an arbitrary position.
    ///
    /// Returns `Ok(false)` if the book has no entry or is unplaced. The
    /// target is clamped into `[1, N]`; the intervening range shifts the
    /// opposite way. Star-group contiguity is deliberately not enforced
    /// here; the next finalize or rebuild restores it.
    pub async fn reposition(
        &self,
        book_id: BookId,
        new_position: u32,
        user_id: UserId,
    ) -> Result<bool, RankingError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut tx = self.store.begin().await.map_err(RankingError::from_store)?;

        let Some((entry, total)) = tx
            .entry_with_total(user_id, book_id)
            .await
            .map_err(RankingError::from_store)?
        else {
            return Ok(false);
        };
        if !entry.is_placed() {
            return Ok(false);
        }

        let old = entry.position;
        let target = new_position.clamp(1, total);
        if target != new_position {
            tracing::warn!(
                user = %user_id,
                book = %book_id,
                requested = new_position,
                clamped = target,
                "reposition target clamped to the dense range"
            );
        }
        if target == old {
            return Ok(true);
        }

        tx.update_entry(user_id, book_id, target, entry.stars)
            .await
            .map_err(RankingError::from_store)?;
        if target < old {
            // Moving up: everything in [target, old) slides down one.
            tx.shift_positions(user_id, target, Some(old - 1), 1, Some(book_id))
                .await
                .map_err(RankingError::from_store)?;
        } else {
            // Moving down: everything in (old, target] slides up one.
            tx.shift_positions(user_id, old + 1, Some(target), -1, Some(book_id))
                .await
                .map_err(RankingError::from_store)?;
        }

        tx.commit().await.map_err(RankingError::from_store)?;
        tracing::debug!(user = %user_id, book = %book_id, from = old, to = target, "entry repositioned");
        Ok(true)
    }

    /// Rebuild a user's entire order from scratch.
    ///
    /// Sorts every entry (placed and unplaced) by stars descending, then
    /// title, then book id, and reassigns positions `1..=N`.
    /// Deterministic and idempotent. Returns the number of entries
    /// assigned.
    pub async fn rebuild(&self, user_id: UserId) -> Result<u32, RankingError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut tx = self.store.begin().await.map_err(RankingError::from_store)?;
        let assigned = self.rebuild_in_tx(&mut tx, user_id).await?;
        tx.commit().await.map_err(RankingError::from_store)?;
        tracing::info!(user = %user_id, entries = assigned, "rank order rebuilt");
        Ok(assigned)
    }

    /// Compute the position-derived rating for one book.
    ///
    /// Returns `Ok(None)` if the book has no entry or is unplaced.
    pub async fn derived_rating(
        &self,
        book_id: BookId,
        user_id: UserId,
    ) -> Result<Option<DerivedRating>, RankingError> {
        let found = self
            .store
            .entry_with_total(user_id, book_id)
            .await
            .map_err(RankingError::from_store)?;
        Ok(found.and_then(|(entry, total)| {
            entry
                .is_placed()
                .then(|| DerivedRating::from_position(entry.position, total))
        }))
    }

    /// Fetch every recorded comparison mentioning a book, newest first.
    pub async fn comparison_history(
        &self,
        book_id: BookId,
    ) -> Result<Vec<ComparisonRecord>, RankingError> {
        self.store
            .comparisons_for(book_id)
            .await
            .map_err(RankingError::from_store)
    }

    /// Fetch a user's ordered ranking list.
    pub async fn ranked_books(&self, user_id: UserId) -> Result<Vec<RankedBook>, RankingError> {
        self.store
            .ranked_books(user_id)
            .await
            .map_err(RankingError::from_store)
    }

    /// Insert the entry or, if one already exists for this (user, book),
    /// rewrite its position and stars.
    async fn write_entry(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        book_id: BookId,
        position: u32,
        stars: Stars,
    ) -> Result<(), RankingError> {
        let updated = tx
            .update_entry(user_id, book_id, position, stars)
            .await
            .map_err(RankingError::from_store)?;
        if !updated {
            let entry = RankingEntry::new(user_id, book_id, position, stars, Utc::now());
            tx.insert_entry(&entry)
                .await
                .map_err(RankingError::from_store)?;
        }
        Ok(())
    }

    /// Resolve the legal target position for this star group.
    async fn clamp_into_star_group(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        requested: u32,
        stars: Stars,
    ) -> Result<u32, RankingError> {
        let bounds = tx
            .star_group_bounds(user_id, stars)
            .await
            .map_err(RankingError::from_store)?;
        match bounds {
            Some((min, max)) => Ok(requested.clamp(min, max + 1)),
            None => {
                // First member of its group: it starts directly below the
                // next-higher star group, whatever was requested.
                let above = tx
                    .max_position_above_stars(user_id, stars)
                    .await
                    .map_err(RankingError::from_store)?;
                Ok(above.map_or(1, |p| p + 1))
            }
        }
    }

    /// Reassign every entry of one user inside an open transaction.
    async fn rebuild_in_tx(&self, tx: &mut S::Tx, user_id: UserId) -> Result<u32, RankingError> {
        let mut rows = tx
            .entries_for_rebuild(user_id)
            .await
            .map_err(RankingError::from_store)?;
        rows.sort_by(|a, b| {
            b.stars
                .cmp(&a.stars)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.book_id.cmp(&b.book_id))
        });

        let assignments: Vec<(BookId, u32)> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.book_id, index as u32 + 1))
            .collect();
        tx.assign_positions(user_id, &assignments)
            .await
            .map_err(RankingError::from_store)?;
        Ok(assignments.len() as u32)
    }
}
