use resolved_core::{
    CategoryId, FilterCounts, TidsByFilter, Timestamp, Topic, TopicId, UserId, WatchState,
};
use std::collections::{HashMap, HashSet};

pub struct PartitionInput<'a> {
    pub topics: &'a [Topic],
    pub followed: &'a HashSet<TopicId>,
    pub watch_states: &'a HashMap<CategoryId, WatchState>,
    pub blocked: &'a HashSet<UserId>,
    pub category_filter: Option<&'a [CategoryId]>,
    pub resolved_times: &'a HashMap<TopicId, Timestamp>,
}

/// Sorts topics into the four buckets. Buckets overlap; each holds a topic
/// at most once and keeps the input order.
pub fn partition(input: &PartitionInput<'_>) -> (TidsByFilter, FilterCounts) {
    let mut buckets = TidsByFilter::default();
    let mut seen = HashSet::new();

    for topic in input.topics {
        if topic.cid == 0 || input.blocked.contains(&topic.uid) {
            continue;
        }
        if let Some(cids) = input.category_filter {
            if !cids.contains(&topic.cid) {
                continue;
            }
        }
        if !seen.insert(topic.tid) {
            continue;
        }

        let followed = input.followed.contains(&topic.tid);
        let watching = input.watch_states.get(&topic.cid) == Some(&WatchState::Watching);

        if followed || watching {
            buckets.all.push(topic.tid);
        }
        if followed {
            buckets.watched.push(topic.tid);
        }
        if topic.postcount <= 1 {
            buckets.unreplied.push(topic.tid);
        }
        if !input.resolved_times.contains_key(&topic.tid) {
            buckets.new.push(topic.tid);
        }
    }

    let counts = buckets.counts();
    (buckets, counts)
}
