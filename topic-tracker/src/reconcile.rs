use crate::candidates::Candidates;
use resolved_core::{ScoredTopic, Timestamp, TopicId, MAX_UNRESOLVED_CANDIDATES};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Highest score first, at most [`MAX_UNRESOLVED_CANDIDATES`] entries.
    pub tids: Vec<TopicId>,
    /// Score each kept topic was ranked by.
    pub scores: HashMap<TopicId, Timestamp>,
}

/// Merges the candidate sets into one ranked, bounded list.
///
/// Category and followed candidates are unioned by topic id with the first
/// occurrence winning, so a category score beats a followed score for the
/// same topic. Ignored topics are dropped, as are topics whose score is not
/// newer than the user's resolution time. Self-unresolved candidates bypass
/// the resolution check. After a stable sort by score the highest-scored
/// occurrence of each topic is kept.
pub fn reconcile(
    candidates: &Candidates,
    ignored: &HashSet<TopicId>,
    resolved_times: &HashMap<TopicId, Timestamp>,
) -> ReconcileOutcome {
    let mut seen = HashSet::new();
    let mut merged: Vec<ScoredTopic> = candidates
        .category
        .iter()
        .chain(&candidates.followed)
        .filter(|topic| seen.insert(topic.tid))
        .copied()
        .collect();

    merged.retain(|topic| {
        !ignored.contains(&topic.tid)
            && resolved_times
                .get(&topic.tid)
                .map_or(true, |&resolved| topic.score > resolved)
    });
    merged.extend(
        candidates
            .self_unresolved
            .iter()
            .filter(|topic| !ignored.contains(&topic.tid)),
    );
    merged.sort_by(|a, b| b.score.cmp(&a.score));

    let mut outcome = ReconcileOutcome::default();
    for topic in merged {
        if outcome.tids.len() == MAX_UNRESOLVED_CANDIDATES {
            debug!("Candidate list truncated at {}", MAX_UNRESOLVED_CANDIDATES);
            break;
        }
        if outcome.scores.contains_key(&topic.tid) {
            continue;
        }
        outcome.scores.insert(topic.tid, topic.score);
        outcome.tids.push(topic.tid);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(pairs: &[(TopicId, Timestamp)]) -> Vec<ScoredTopic> {
        pairs
            .iter()
            .map(|&(tid, score)| ScoredTopic::new(tid, score))
            .collect()
    }

    #[test]
    fn test_category_score_wins_on_collision() {
        let candidates = Candidates {
            category: scored(&[(1, 100)]),
            followed: scored(&[(1, 900), (2, 500)]),
            self_unresolved: vec![],
        };
        let outcome = reconcile(&candidates, &HashSet::new(), &HashMap::new());
        assert_eq!(outcome.tids, vec![2, 1]);
        assert_eq!(outcome.scores[&1], 100);
    }

    #[test]
    fn test_drops_ignored_and_resolved() {
        let candidates = Candidates {
            category: scored(&[(1, 300), (2, 200), (3, 100)]),
            followed: vec![],
            self_unresolved: vec![],
        };
        let ignored = HashSet::from([1]);
        let resolved = HashMap::from([(2, 200), (3, 50)]);
        let outcome = reconcile(&candidates, &ignored, &resolved);
        assert_eq!(outcome.tids, vec![3]);
    }

    #[test]
    fn test_self_unresolved_bypasses_resolution_time() {
        let candidates = Candidates {
            category: scored(&[(1, 300)]),
            followed: vec![],
            self_unresolved: scored(&[(1, 100), (4, 50)]),
        };
        let ignored = HashSet::from([4]);
        let resolved = HashMap::from([(1, 400)]);
        let outcome = reconcile(&candidates, &ignored, &resolved);
        assert_eq!(outcome.tids, vec![1]);
        assert_eq!(outcome.scores[&1], 100);
    }

    #[test]
    fn test_duplicates_keep_highest_score() {
        let candidates = Candidates {
            category: scored(&[(5, 10)]),
            followed: vec![],
            self_unresolved: scored(&[(5, 70)]),
        };
        let outcome = reconcile(&candidates, &HashSet::new(), &HashMap::new());
        assert_eq!(outcome.tids, vec![5]);
        assert_eq!(outcome.scores[&5], 70);
    }

    #[test]
    fn test_never_exceeds_bound() {
        let category: Vec<ScoredTopic> = (0..500).map(|i| ScoredTopic::new(i, i)).collect();
        let self_unresolved: Vec<ScoredTopic> =
            (400..700).map(|i| ScoredTopic::new(i, 1_000 + i)).collect();
        let candidates = Candidates {
            category,
            followed: vec![],
            self_unresolved,
        };
        let outcome = reconcile(&candidates, &HashSet::new(), &HashMap::new());
        assert_eq!(outcome.tids.len(), MAX_UNRESOLVED_CANDIDATES);
        assert_eq!(outcome.tids[0], 699);
        let unique: HashSet<_> = outcome.tids.iter().collect();
        assert_eq!(unique.len(), outcome.tids.len());
    }

    #[test]
    fn test_empty_input() {
        let outcome = reconcile(&Candidates::default(), &HashSet::new(), &HashMap::new());
        assert!(outcome.tids.is_empty());
    }
}
