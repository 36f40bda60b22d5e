use resolved_core::{
    CoreError, CoreResult, DatabaseError, ScoreBound, ScoredMember, SetStore, SortedSetStore,
    Timestamp,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;

/// In-process store with the same ordering rules as [`crate::Database`]:
/// descending score, ties broken by ascending member.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sorted: RwLock<HashMap<String, HashMap<String, Timestamp>>>,
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later read of `key` fail, for exercising error paths.
    pub fn fail_reads_of(&self, key: impl Into<String>) {
        if let Ok(mut keys) = self.failing_keys.lock() {
            keys.insert(key.into());
        }
    }

    fn check_readable(&self, key: &str) -> CoreResult<()> {
        let failing = self
            .failing_keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false);
        if failing {
            return Err(CoreError::Database(DatabaseError::QueryFailed {
                query: format!("read {}", key),
            }));
        }
        Ok(())
    }

    fn sort_desc(members: &mut [ScoredMember]) {
        members.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.value.cmp(&b.value)));
    }
}

impl SortedSetStore for MemoryStore {
    async fn sorted_set_add(&self, key: &str, score: Timestamp, member: &str) -> CoreResult<()> {
        let mut sorted = self.sorted.write().await;
        sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut sorted = self.sorted.write().await;
        if let Some(set) = sorted.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sorted.remove(key);
            }
        }
        Ok(())
    }

    async fn sorted_set_members(&self, key: &str) -> CoreResult<Vec<String>> {
        let mut members = self.rev_range_with_scores(key).await?;
        members.reverse();
        Ok(members.into_iter().map(|member| member.value).collect())
    }

    async fn sorted_set_scores(
        &self,
        key: &str,
        members: &[String],
    ) -> CoreResult<Vec<Option<Timestamp>>> {
        self.check_readable(key)?;
        let sorted = self.sorted.read().await;
        let set = sorted.get(key);
        Ok(members
            .iter()
            .map(|member| set.and_then(|set| set.get(member).copied()))
            .collect())
    }

    async fn is_sorted_set_members(
        &self,
        key: &str,
        members: &[String],
    ) -> CoreResult<Vec<bool>> {
        let scores = self.sorted_set_scores(key, members).await?;
        Ok(scores.into_iter().map(|score| score.is_some()).collect())
    }

    async fn rev_range_by_score_with_scores(
        &self,
        keys: &[String],
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<ScoredMember>> {
        for key in keys {
            self.check_readable(key)?;
        }
        let sorted = self.sorted.read().await;
        let mut best: HashMap<&str, Timestamp> = HashMap::new();
        for set in keys.iter().filter_map(|key| sorted.get(key)) {
            for (member, &score) in set {
                if !min.admits_above(score) || !max.admits_below(score) {
                    continue;
                }
                let entry = best.entry(member.as_str()).or_insert(score);
                if score > *entry {
                    *entry = score;
                }
            }
        }
        let mut members: Vec<ScoredMember> = best
            .into_iter()
            .map(|(value, score)| ScoredMember::new(value, score))
            .collect();
        Self::sort_desc(&mut members);
        Ok(members)
    }

    async fn rev_range_with_scores(&self, key: &str) -> CoreResult<Vec<ScoredMember>> {
        self.check_readable(key)?;
        let sorted = self.sorted.read().await;
        let mut members: Vec<ScoredMember> = sorted
            .get(key)
            .map(|set| {
                set.iter()
                    .map(|(value, &score)| ScoredMember::new(value.clone(), score))
                    .collect()
            })
            .unwrap_or_default();
        Self::sort_desc(&mut members);
        Ok(members)
    }

    async fn range_by_score(
        &self,
        key: &str,
        start: usize,
        count: usize,
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<String>> {
        let mut members = self.rev_range_with_scores(key).await?;
        members.retain(|member| min.admits_above(member.score) && max.admits_below(member.score));
        members.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.value.cmp(&b.value)));
        Ok(members
            .into_iter()
            .skip(start)
            .take(count)
            .map(|member| member.value)
            .collect())
    }
}

impl SetStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut sets = self.sets.write().await;
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut sets = self.sets.write().await;
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    async fn is_set_member(&self, key: &str, member: &str) -> CoreResult<bool> {
        self.check_readable(key)?;
        let sets = self.sets.read().await;
        Ok(sets.get(key).map_or(false, |set| set.contains(member)))
    }

    async fn set_members(&self, key: &str) -> CoreResult<Vec<String>> {
        self.check_readable(key)?;
        let sets = self.sets.read().await;
        Ok(sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multi_key_range_keeps_highest_score() {
        let store = MemoryStore::new();
        store.sorted_set_add("a", 10, "1").await.unwrap();
        store.sorted_set_add("b", 30, "1").await.unwrap();
        store.sorted_set_add("b", 20, "2").await.unwrap();
        store.sorted_set_add("b", 5, "3").await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string()];
        let members = store
            .rev_range_by_score_with_scores(&keys, ScoreBound::Inclusive(10), ScoreBound::Unbounded)
            .await
            .unwrap();
        assert_eq!(
            members,
            vec![ScoredMember::new("1", 30), ScoredMember::new("2", 20)]
        );
    }

    #[tokio::test]
    async fn test_range_by_score_pages_ascending() {
        let store = MemoryStore::new();
        for (score, member) in [(1, "p1"), (2, "p2"), (3, "p3"), (4, "p4"), (5, "p5")] {
            store.sorted_set_add("posts", score, member).await.unwrap();
        }

        let first = store
            .range_by_score("posts", 0, 2, ScoreBound::Exclusive(1), ScoreBound::Unbounded)
            .await
            .unwrap();
        assert_eq!(first, vec!["p2", "p3"]);

        let second = store
            .range_by_score("posts", 2, 2, ScoreBound::Exclusive(1), ScoreBound::Unbounded)
            .await
            .unwrap();
        assert_eq!(second, vec!["p4", "p5"]);

        let third = store
            .range_by_score("posts", 4, 2, ScoreBound::Exclusive(1), ScoreBound::Unbounded)
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_set_membership_is_idempotent() {
        let store = MemoryStore::new();
        store.set_add("markers", "7").await.unwrap();
        store.set_add("markers", "7").await.unwrap();
        assert_eq!(store.set_members("markers").await.unwrap(), vec!["7"]);

        store.set_remove("markers", "7").await.unwrap();
        store.set_remove("markers", "7").await.unwrap();
        assert!(!store.is_set_member("markers", "7").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_key_reports_database_error() {
        let store = MemoryStore::new();
        store.fail_reads_of("broken");
        let err = store.rev_range_with_scores("broken").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::QueryFailed { .. })
        ));
    }
}
