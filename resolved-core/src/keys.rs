//! Storage key names shared by the tracker and the stores.

use crate::types::{CategoryId, TopicId, UserId};

/// Global recency of every topic.
pub const TOPICS_RECENT: &str = "topics:recent";
/// Topics explicitly marked unresolved, scored by when.
pub const TOPICS_UNRESOLVED: &str = "topics:unresolved";

pub fn user_resolved_tids(uid: UserId) -> String {
    format!("uid:{}:tids_resolved", uid)
}

pub fn user_unresolved_tids(uid: UserId) -> String {
    format!("uid:{}:tids_unresolved", uid)
}

pub fn user_followed_tids(uid: UserId) -> String {
    format!("uid:{}:followed_tids", uid)
}

pub fn category_tids_by_last_post(cid: CategoryId) -> String {
    format!("cid:{}:tids:lastposttime", cid)
}

pub fn topic_resolved_marker(tid: TopicId) -> String {
    format!("tid:{}:resolved", tid)
}

pub fn topic_unresolved_marker(tid: TopicId) -> String {
    format!("tid:{}:unresolved", tid)
}

pub fn topic_posts(tid: TopicId) -> String {
    format!("tid:{}:posts", tid)
}
