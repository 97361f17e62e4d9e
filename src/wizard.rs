//! Comparison wizard planning.
//!
//! A wizard session asks the reader a handful of "this book or that one?"
//! questions against books already placed in the same star group, enough
//! for the client to pin down where the new book belongs. Planning is
//! pure: this module never touches storage.

use serde::{Deserialize, Serialize};

use crate::types::{BookId, RankedBook, Stars};

/// Default ceiling on comparison questions per wizard session.
pub const DEFAULT_COMPARISON_CAP: usize = 10;

/// Tuning knobs for wizard planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardPolicy {
    /// Hard ceiling on questions per session.
    pub comparison_cap: usize,
}

impl WizardPolicy {
    /// Create a policy with an explicit question cap.
    pub fn new(comparison_cap: usize) -> Self {
        Self { comparison_cap }
    }
}

impl Default for WizardPolicy {
    fn default() -> Self {
        Self {
            comparison_cap: DEFAULT_COMPARISON_CAP,
        }
    }
}

/// One proposed question: the new book against this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPrompt {
    /// Opposing book.
    pub book_id: BookId,
    /// Opposing book's title.
    pub title: String,
    /// Opposing book's author.
    pub author: String,
    /// Opposing book's current rank position.
    pub position: u32,
}

impl ComparisonPrompt {
    /// Build a prompt against one ranked book.
    pub fn against(candidate: &RankedBook) -> Self {
        Self {
            book_id: candidate.book_id,
            title: candidate.title.clone(),
            author: candidate.author.clone(),
            position: candidate.position,
        }
    }
}

/// Wizard session opener: the questions to resolve plus ranking context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardResponse {
    /// Book being placed.
    pub book_id: BookId,
    /// Star rating the session was opened with.
    pub stars: Stars,
    /// Ordered comparison prompts; empty when no questions are needed.
    pub comparisons: Vec<ComparisonPrompt>,
    /// Placed entries the user already has, not counting the target book.
    pub total_ranked: u32,
    /// Size of the target star group, when candidates were considered.
    pub same_star_count: Option<u32>,
}

/// Question budget for `n` same-star candidates under `cap`.
///
/// `min(ceil(log2(n + 1)), cap)`; zero candidates need zero questions.
/// The emitted plan never exceeds this, though it can come up short when
/// the probe window empties first.
pub fn question_count(n: usize, cap: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let log = ((n + 1) as f64).log2().ceil() as usize;
    log.min(cap)
}

/// Plan the comparison prompts for one wizard session.
///
/// `candidates` must be ordered by ascending position (best first). The
/// planner probes midpoints of a `[left, right]` index window, narrowing
/// the window by step parity: odd-numbered questions drop the better
/// half, even-numbered ones the worse half. The result is a fixed probe
/// sequence spread across the group; the client resolves the whole batch
/// and derives the final position from the outcomes against each
/// prompt's recorded position.
pub fn plan_comparisons(candidates: &[RankedBook], policy: &WizardPolicy) -> Vec<ComparisonPrompt> {
    let planned = question_count(candidates.len(), policy.comparison_cap);
    let mut prompts = Vec::with_capacity(planned);

    let mut left: isize = 0;
    let mut right: isize = candidates.len() as isize - 1;

    while prompts.len() < planned && left <= right {
        let mid = ((left + right) / 2) as usize;
        prompts.push(ComparisonPrompt::against(&candidates[mid]));
        if prompts.len() % 2 == 1 {
            left = mid as isize + 1;
        } else {
            right = mid as isize - 1;
        }
    }

    prompts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_list(n: usize) -> Vec<RankedBook> {
        (1..=n)
            .map(|i| RankedBook {
                book_id: BookId::new(i as i64),
                title: format!("Book {i}"),
                author: "Author".to_string(),
                position: i as u32,
                stars: Stars::from_f32(4.0).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_question_count_grows_logarithmically() {
        assert_eq!(question_count(0, 10), 0);
        assert_eq!(question_count(1, 10), 1);
        assert_eq!(question_count(3, 10), 2);
        assert_eq!(question_count(7, 10), 3);
        assert_eq!(question_count(100, 10), 7);
    }

    #[test]
    fn test_question_count_respects_cap() {
        assert_eq!(question_count(10_000, 10), 10);
        assert_eq!(question_count(10_000, 3), 3);
        assert_eq!(question_count(2, 1), 1);
    }

    #[test]
    fn test_plan_empty_candidates() {
        let prompts = plan_comparisons(&[], &WizardPolicy::default());
        assert!(prompts.is_empty());
    }

    #[test]
    fn test_plan_single_candidate() {
        let candidates = candidate_list(1);
        let prompts = plan_comparisons(&candidates, &WizardPolicy::default());
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].book_id, BookId::new(1));
        assert_eq!(prompts[0].position, 1);
    }

    #[test]
    fn test_plan_probe_sequence_for_five() {
        // Window walk over [0, 4]: probe index 2, drop the better half,
        // probe index 3, drop the worse half, then the window is empty.
        let candidates = candidate_list(5);
        let prompts = plan_comparisons(&candidates, &WizardPolicy::default());
        let probed: Vec<u32> = prompts.iter().map(|p| p.position).collect();
        assert_eq!(probed, vec![3, 4]);
    }

    #[test]
    fn test_plan_prompts_drawn_from_candidates() {
        let candidates = candidate_list(40);
        let prompts = plan_comparisons(&candidates, &WizardPolicy::default());
        assert!(!prompts.is_empty());
        assert!(prompts.len() <= question_count(40, 10));
        for prompt in &prompts {
            assert!(candidates.iter().any(|c| c.book_id == prompt.book_id));
        }
    }

    #[test]
    fn test_plan_stops_when_window_empties() {
        // Four candidates budget three questions, but the window walk
        // lands on indices 1 then 2 and runs dry.
        let candidates = candidate_list(4);
        let prompts = plan_comparisons(&candidates, &WizardPolicy::default());
        assert_eq!(question_count(4, 10), 3);
        let probed: Vec<u32> = prompts.iter().map(|p| p.position).collect();
        assert_eq!(probed, vec![2, 3]);
    }

    #[test]
    fn test_plan_never_repeats_a_candidate() {
        for n in 1..64 {
            let candidates = candidate_list(n);
            let prompts = plan_comparisons(&candidates, &WizardPolicy::default());
            let mut seen: Vec<BookId> = prompts.iter().map(|p| p.book_id).collect();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), prompts.len(), "duplicate probe for n = {n}");
        }
    }

    #[test]
    fn test_plan_respects_cap() {
        let candidates = candidate_list(500);
        let policy = WizardPolicy::new(4);
        let prompts = plan_comparisons(&candidates, &policy);
        assert_eq!(prompts.len(), 4);
    }
}
