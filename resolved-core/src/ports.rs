//! Interfaces to the collaborators the tracker depends on.
//!
//! Storage follows sorted-set / set semantics keyed by the names in
//! [`crate::keys`]. Forum lookups cover topic, post, user, category,
//! privilege and notification data owned elsewhere. Failures from either side are returned
//! unchanged to the caller.

use crate::error::CoreResult;
use crate::types::{
    CategoryId, PostAuthor, PostId, Timestamp, Topic, TopicId, UserId, WatchState,
};

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Inclusive(Timestamp),
    Exclusive(Timestamp),
    Unbounded,
}

impl ScoreBound {
    pub fn admits_above(self, score: Timestamp) -> bool {
        match self {
            ScoreBound::Inclusive(min) => score >= min,
            ScoreBound::Exclusive(min) => score > min,
            ScoreBound::Unbounded => true,
        }
    }

    pub fn admits_below(self, score: Timestamp) -> bool {
        match self {
            ScoreBound::Inclusive(max) => score <= max,
            ScoreBound::Exclusive(max) => score < max,
            ScoreBound::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub value: String,
    pub score: Timestamp,
}

impl ScoredMember {
    pub fn new(value: impl Into<String>, score: Timestamp) -> Self {
        Self {
            value: value.into(),
            score,
        }
    }
}

pub trait SortedSetStore {
    /// Inserts or rescores `member`.
    async fn sorted_set_add(&self, key: &str, score: Timestamp, member: &str) -> CoreResult<()>;

    async fn sorted_set_remove(&self, key: &str, member: &str) -> CoreResult<()>;

    async fn sorted_set_members(&self, key: &str) -> CoreResult<Vec<String>>;

    /// Scores aligned with `members`; `None` where absent.
    async fn sorted_set_scores(
        &self,
        key: &str,
        members: &[String],
    ) -> CoreResult<Vec<Option<Timestamp>>>;

    async fn is_sorted_set_members(&self, key: &str, members: &[String])
        -> CoreResult<Vec<bool>>;

    /// Members of all `keys` within `[min, max]`, highest score first. A
    /// member present under several keys is reported once with its highest
    /// score. Order among equal scores is unspecified.
    async fn rev_range_by_score_with_scores(
        &self,
        keys: &[String],
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<ScoredMember>>;

    /// Every member of `key`, highest score first.
    async fn rev_range_with_scores(&self, key: &str) -> CoreResult<Vec<ScoredMember>>;

    /// A page of members within `[min, max]`, lowest score first.
    async fn range_by_score(
        &self,
        key: &str,
        start: usize,
        count: usize,
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<String>>;
}

pub trait SetStore {
    async fn set_add(&self, key: &str, member: &str) -> CoreResult<()>;

    async fn set_remove(&self, key: &str, member: &str) -> CoreResult<()>;

    async fn is_set_member(&self, key: &str, member: &str) -> CoreResult<bool>;

    async fn set_members(&self, key: &str) -> CoreResult<Vec<String>>;
}

pub trait Storage: SortedSetStore + SetStore {}

impl<T: SortedSetStore + SetStore> Storage for T {}

pub trait TopicLookup {
    /// Topic records aligned with `tids`; `None` for unknown ids.
    async fn topics_fields(&self, tids: &[TopicId]) -> CoreResult<Vec<Option<Topic>>>;

    async fn topic_exists(&self, tid: TopicId) -> CoreResult<bool>;
}

pub trait PostLookup {
    async fn post_authors(&self, pids: &[PostId]) -> CoreResult<Vec<PostAuthor>>;
}

pub trait UserLookup {
    async fn blocked_uids(&self, uid: UserId) -> CoreResult<Vec<UserId>>;

    async fn ignored_tids(&self, uid: UserId) -> CoreResult<Vec<TopicId>>;

    async fn watched_categories(&self, uid: UserId) -> CoreResult<Vec<CategoryId>>;
}

pub trait CategoryLookup {
    /// Watch states aligned with `cids`.
    async fn watch_states(&self, cids: &[CategoryId], uid: UserId) -> CoreResult<Vec<WatchState>>;

    async fn mark_unresolved_for_all(&self, cid: CategoryId) -> CoreResult<()>;
}

pub trait PrivilegeFilter {
    /// The subset of `tids` that `uid` holds `privilege` on, order kept.
    async fn filter_tids(
        &self,
        privilege: &str,
        tids: &[TopicId],
        uid: UserId,
    ) -> CoreResult<Vec<TopicId>>;
}

/// A user's notification inbox.
pub trait NotificationStore {
    /// Ids of `uid`'s unread notifications attached to any of `tids`.
    async fn unread_nids_by_tids(&self, uid: UserId, tids: &[TopicId]) -> CoreResult<Vec<String>>;

    async fn mark_read(&self, nids: &[String], uid: UserId) -> CoreResult<()>;

    /// Pushes the fresh unread-notification count to `uid`'s sessions.
    async fn push_count(&self, uid: UserId) -> CoreResult<()>;
}

pub trait Forum:
    TopicLookup + PostLookup + UserLookup + CategoryLookup + PrivilegeFilter + NotificationStore
{
}

impl<T> Forum for T where
    T: TopicLookup + PostLookup + UserLookup + CategoryLookup + PrivilegeFilter + NotificationStore
{
}
