//! Explicit resolve / unresolve actions.
//!
//! Every mutation is a pair of independent single-key writes. A failure
//! between them can leave a topic with neither marker, or briefly both;
//! repeating the call converges.

use crate::candidates::member_strings;
use crate::hooks::{HookBus, ACTION_MARK_AS_RESOLVED, ACTION_MARK_AS_UNRESOLVED};
use resolved_core::keys;
use resolved_core::{
    CoreError, CoreResult, ResolutionState, SetStore, SortedSetStore, Timestamp, TopicId,
    TopicLookup, UserId,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize)]
struct TopicActionPayload {
    tid: TopicId,
}

pub struct ResolutionStore<'a, S, T> {
    storage: &'a S,
    topics: &'a T,
    hooks: &'a HookBus,
    now: Timestamp,
}

impl<'a, S, T> ResolutionStore<'a, S, T>
where
    S: SortedSetStore + SetStore,
    T: TopicLookup,
{
    pub fn new(storage: &'a S, topics: &'a T, hooks: &'a HookBus, now: Timestamp) -> Self {
        Self {
            storage,
            topics,
            hooks,
            now,
        }
    }

    pub async fn mark_as_resolved(&self, tid: TopicId) -> CoreResult<bool> {
        let member = tid.to_string();
        let resolved_key = keys::topic_resolved_marker(tid);
        let unresolved_key = keys::topic_unresolved_marker(tid);
        tokio::try_join!(
            self.storage.set_add(&resolved_key, &member),
            self.storage.set_remove(&unresolved_key, &member),
            self.storage.sorted_set_remove(keys::TOPICS_UNRESOLVED, &member),
        )?;
        self.hooks
            .fire_action(ACTION_MARK_AS_RESOLVED, &TopicActionPayload { tid });
        debug!("tid {} marked resolved", tid);
        Ok(true)
    }

    pub async fn mark_as_unresolved(&self, tid: TopicId) -> CoreResult<bool> {
        let member = tid.to_string();
        let resolved_key = keys::topic_resolved_marker(tid);
        let unresolved_key = keys::topic_unresolved_marker(tid);
        tokio::try_join!(
            self.storage.set_add(&unresolved_key, &member),
            self.storage.set_remove(&resolved_key, &member),
        )?;
        self.hooks
            .fire_action(ACTION_MARK_AS_UNRESOLVED, &TopicActionPayload { tid });
        debug!("tid {} marked unresolved", tid);
        Ok(true)
    }

    /// Like [`Self::mark_as_unresolved`] but refuses unknown topics and
    /// records when the topic was reopened.
    pub async fn mark_unresolved(&self, tid: TopicId) -> CoreResult<()> {
        if !self.topics.topic_exists(tid).await? {
            return Err(CoreError::NoSuchTopic { tid });
        }
        let member = tid.to_string();
        self.storage
            .set_remove(&keys::topic_resolved_marker(tid), &member)
            .await?;
        self.storage
            .set_add(&keys::topic_unresolved_marker(tid), &member)
            .await?;
        self.storage
            .sorted_set_add(keys::TOPICS_UNRESOLVED, self.now, &member)
            .await?;
        self.hooks
            .fire_action(ACTION_MARK_AS_UNRESOLVED, &TopicActionPayload { tid });
        info!("tid {} reopened at {}", tid, self.now);
        Ok(())
    }

    pub async fn resolution_state(&self, tid: TopicId) -> CoreResult<ResolutionState> {
        let member = tid.to_string();
        let resolved_key = keys::topic_resolved_marker(tid);
        let unresolved_key = keys::topic_unresolved_marker(tid);
        let (resolved, unresolved) = tokio::try_join!(
            self.storage.is_set_member(&resolved_key, &member),
            self.storage.is_set_member(&unresolved_key, &member),
        )?;
        Ok(match (resolved, unresolved) {
            (_, true) => ResolutionState::Unresolved,
            (true, false) => ResolutionState::Resolved,
            (false, false) => ResolutionState::Unmarked,
        })
    }

    /// Records that `uid` resolved `tids` now and clears their explicit
    /// unresolved entries. Returns `false` for anonymous users.
    pub async fn mark_topics_resolved_for_user(
        &self,
        uid: UserId,
        tids: &[TopicId],
    ) -> CoreResult<bool> {
        if uid <= 0 || tids.is_empty() {
            return Ok(false);
        }
        let resolved_key = keys::user_resolved_tids(uid);
        let unresolved_key = keys::user_unresolved_tids(uid);
        for member in member_strings(tids) {
            self.storage
                .sorted_set_add(&resolved_key, self.now, &member)
                .await?;
            self.storage
                .sorted_set_remove(&unresolved_key, &member)
                .await?;
        }
        debug!("uid {} resolved {} topics", uid, tids.len());
        Ok(true)
    }

    /// Puts `tid` back on the user's unresolved list, scored by the topic's
    /// recency (or now when it has none).
    pub async fn mark_topic_unresolved_for_user(&self, uid: UserId, tid: TopicId) -> CoreResult<()> {
        if uid <= 0 {
            return Ok(());
        }
        if !self.topics.topic_exists(tid).await? {
            return Err(CoreError::NoSuchTopic { tid });
        }
        let member = tid.to_string();
        let recency = self
            .storage
            .sorted_set_scores(keys::TOPICS_RECENT, std::slice::from_ref(&member))
            .await?
            .into_iter()
            .next()
            .flatten()
            .unwrap_or(self.now);
        self.storage
            .sorted_set_remove(&keys::user_resolved_tids(uid), &member)
            .await?;
        self.storage
            .sorted_set_add(&keys::user_unresolved_tids(uid), recency, &member)
            .await?;
        debug!("uid {} reopened tid {}", uid, tid);
        Ok(())
    }
}
