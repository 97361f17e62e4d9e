//! Property tests for ordering invariants under random operation sequences.
//!
//! Covers:
//! 1. Positions stay exactly `1..=N` after any mix of finalize,
//!    reposition, and rebuild
//! 2. Star groups stay contiguous until a reposition breaks them and a
//!    rebuild repairs them
//! 3. Rebuild is idempotent after any history
//! 4. Wizard planning draws each candidate at most once

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use shelfrank::{
    plan_comparisons, question_count, BookId, InMemoryRankStore, RankedBook, RankingEngine, Stars,
    UserId, WizardPolicy,
};

const BOOK_COUNT: i64 = 12;

fn reader() -> UserId {
    UserId::new(7)
}

/// Engine over a store with the whole catalog pre-registered.
fn fresh_engine() -> RankingEngine<InMemoryRankStore> {
    let store = Arc::new(InMemoryRankStore::new());
    for book in 1..=BOOK_COUNT {
        store.add_book(BookId::new(book), &format!("Book {book:02}"), "Test Author");
    }
    RankingEngine::with_default_policy(store)
}

fn verify_dense(ranked: &[RankedBook]) {
    let positions: Vec<u32> = ranked.iter().map(|b| b.position).collect();
    let expected: Vec<u32> = (1..=ranked.len() as u32).collect();
    assert_eq!(positions, expected, "positions not dense: {positions:?}");
}

fn verify_star_contiguous(ranked: &[RankedBook]) {
    for pair in ranked.windows(2) {
        assert!(
            pair[0].stars >= pair[1].stars,
            "star order violated: {} above {}",
            pair[0].stars,
            pair[1].stars
        );
    }
}

fn verify_matches_expected(ranked: &[RankedBook], expected: &BTreeMap<i64, u8>) {
    assert_eq!(ranked.len(), expected.len(), "placed set drifted");
    for book in ranked {
        let half_steps = expected
            .get(&book.book_id.as_i64())
            .unwrap_or_else(|| panic!("unexpected book {} in ranking", book.book_id));
        assert_eq!(book.stars.half_steps(), *half_steps, "stars clobbered");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random finalize/reposition/rebuild sequences. Op kind 0 finalizes,
    /// 1 repositions, 2 rebuilds; unused fields are ignored.
    #[test]
    fn ordering_invariants_random_ops(
        ops in prop::collection::vec(
            (0_u8..3, 1..=BOOK_COUNT, 1_u32..=16, 0_u8..=10),
            1..=24
        ),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let engine = fresh_engine();
            let user = reader();

            // Stars by finalized book; mirrors what the store should hold.
            let mut expected: BTreeMap<i64, u8> = BTreeMap::new();
            // Reposition may break star contiguity until the next rebuild.
            let mut hatch_open = false;

            for (kind, book, position, half_steps) in &ops {
                match kind {
                    0 => {
                        let stars = Stars::from_half_steps(*half_steps).unwrap();
                        engine
                            .finalize(BookId::new(*book), *position, stars, &[], user)
                            .await
                            .unwrap();
                        expected.insert(*book, *half_steps);
                    }
                    1 => {
                        engine
                            .reposition(BookId::new(*book), *position, user)
                            .await
                            .unwrap();
                        if expected.contains_key(book) {
                            hatch_open = true;
                        }
                    }
                    _ => {
                        engine.rebuild(user).await.unwrap();
                        hatch_open = false;
                    }
                }

                let ranked = engine.ranked_books(user).await.unwrap();
                verify_dense(&ranked);
                verify_matches_expected(&ranked, &expected);
                if !hatch_open {
                    verify_star_contiguous(&ranked);
                }
            }
        });
    }

    /// Whatever the history, one rebuild fully determines the order.
    #[test]
    fn rebuild_idempotent_after_any_history(
        ops in prop::collection::vec(
            (0_u8..2, 1..=BOOK_COUNT, 1_u32..=16, 0_u8..=10),
            1..=16
        ),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let engine = fresh_engine();
            let user = reader();

            for (kind, book, position, half_steps) in &ops {
                if *kind == 0 {
                    let stars = Stars::from_half_steps(*half_steps).unwrap();
                    engine
                        .finalize(BookId::new(*book), *position, stars, &[], user)
                        .await
                        .unwrap();
                } else {
                    engine
                        .reposition(BookId::new(*book), *position, user)
                        .await
                        .unwrap();
                }
            }

            engine.rebuild(user).await.unwrap();
            let first = engine.ranked_books(user).await.unwrap();
            engine.rebuild(user).await.unwrap();
            let second = engine.ranked_books(user).await.unwrap();

            assert_eq!(first, second, "rebuild not idempotent");
            verify_dense(&first);
            verify_star_contiguous(&first);
        });
    }

    /// Pure planning: the probe count stays within budget and no
    /// candidate is probed twice.
    #[test]
    fn wizard_plan_probes_unique_candidates(
        n in 0_usize..200,
        cap in 1_usize..=12,
    ) {
        let candidates: Vec<RankedBook> = (1..=n)
            .map(|i| RankedBook {
                book_id: BookId::new(i as i64),
                title: format!("Book {i:03}"),
                author: "Test Author".to_string(),
                position: i as u32,
                stars: Stars::from_half_steps(8).unwrap(),
            })
            .collect();

        let prompts = plan_comparisons(&candidates, &WizardPolicy::new(cap));

        prop_assert!(prompts.len() <= question_count(n, cap));
        prop_assert_eq!(prompts.is_empty(), n == 0);
        let mut probed: Vec<i64> = prompts.iter().map(|p| p.book_id.as_i64()).collect();
        probed.sort_unstable();
        probed.dedup();
        prop_assert_eq!(probed.len(), prompts.len());
        for prompt in &prompts {
            prop_assert!(prompt.position >= 1 && prompt.position <= n as u32);
        }
    }
}
