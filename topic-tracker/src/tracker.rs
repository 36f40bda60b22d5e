//! Top-level unresolved-topics service.
//!
//! [`UnresolvedTracker`] wires storage, forum collaborators, hooks and the
//! count notifier together. Each public method is one request.

use crate::candidates::{collect_candidates, member_strings, parse_id};
use crate::cutoff::resolve_cutoff;
use crate::hooks::{HookBus, FILTER_GET_UNRESOLVED_TIDS};
use crate::notify::{CountNotifier, NoopNotifier, EVENT_UNRESOLVED_UPDATE_COUNT};
use crate::partition::{partition, PartitionInput};
use crate::reconcile::reconcile;
use crate::resolution::ResolutionStore;
use crate::scanner::BlockedPostScanner;
use chrono::Utc;
use resolved_core::keys;
use resolved_core::{
    CategoryId, CoreResult, FilterCounts, Forum, IndexedTopic, ResolutionState, ScoreBound,
    Storage, TidsByFilter, Timestamp, TopicId, TrackerConfig, UnresolvedCountUpdate,
    UnresolvedData, UnresolvedFilter, UnresolvedQuery, UnresolvedTopicsPage, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

/// Payload of `filter:topics.getUnresolvedTids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedTidsPayload {
    pub uid: UserId,
    pub tids: Vec<TopicId>,
    pub counts: FilterCounts,
    pub tids_by_filter: TidsByFilter,
    pub cid: Option<Vec<CategoryId>>,
    pub filter: UnresolvedFilter,
    #[serde(default)]
    pub query: serde_json::Map<String, serde_json::Value>,
}

impl From<UnresolvedTidsPayload> for UnresolvedData {
    fn from(payload: UnresolvedTidsPayload) -> Self {
        Self {
            counts: payload.counts,
            tids: payload.tids,
            tids_by_filter: payload.tids_by_filter,
        }
    }
}

pub struct UnresolvedTracker<S, F> {
    storage: Arc<S>,
    forum: Arc<F>,
    config: TrackerConfig,
    hooks: Arc<HookBus>,
    notifier: Arc<dyn CountNotifier>,
    clock: Clock,
}

impl<S, F> UnresolvedTracker<S, F>
where
    S: Storage,
    F: Forum,
{
    pub fn new(storage: Arc<S>, forum: Arc<F>, config: TrackerConfig) -> Self {
        Self {
            storage,
            forum,
            config,
            hooks: Arc::new(HookBus::new()),
            notifier: Arc::new(NoopNotifier),
            clock: system_clock(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<HookBus>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CountNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn resolution_store(&self) -> ResolutionStore<'_, S, F> {
        ResolutionStore::new(&*self.storage, &*self.forum, &self.hooks, self.now())
    }

    /// Computes the bucketed unresolved topics for `query.uid` and passes
    /// them through `filter:topics.getUnresolvedTids`.
    pub async fn get_unresolved_data(&self, query: &UnresolvedQuery) -> CoreResult<UnresolvedData> {
        let data = self.compute_unresolved(query).await?;
        if query.uid <= 0 || data.tids.is_empty() {
            return Ok(data);
        }

        let payload = self.hooks.fire_filter(
            FILTER_GET_UNRESOLVED_TIDS,
            UnresolvedTidsPayload {
                uid: query.uid,
                tids: data.tids,
                counts: data.counts,
                tids_by_filter: data.tids_by_filter,
                cid: query.cids.clone(),
                filter: query.filter,
                query: query.query.clone(),
            },
        )?;
        Ok(payload.into())
    }

    async fn compute_unresolved(&self, query: &UnresolvedQuery) -> CoreResult<UnresolvedData> {
        let uid = query.uid;
        if uid <= 0 {
            return Ok(UnresolvedData::default());
        }
        if query.cids.as_ref().map_or(false, Vec::is_empty) {
            debug!("uid {}: empty category filter", uid);
            return Ok(UnresolvedData::default());
        }

        let storage = &*self.storage;
        let forum = &*self.forum;
        let cutoff = resolve_cutoff(&self.hooks, uid, self.now(), self.config.unresolved_cutoff_days)?;

        let resolved_key = keys::user_resolved_tids(uid);
        let (candidates, ignored, resolved_members) = tokio::try_join!(
            collect_candidates(storage, forum, &self.hooks, query, cutoff),
            forum.ignored_tids(uid),
            storage.rev_range_by_score_with_scores(
                std::slice::from_ref(&resolved_key),
                ScoreBound::Inclusive(cutoff.timestamp()),
                ScoreBound::Unbounded,
            ),
        )?;

        let resolved_times = resolved_members
            .iter()
            .map(|member| Ok((parse_id(&resolved_key, &member.value)?, member.score)))
            .collect::<CoreResult<HashMap<TopicId, Timestamp>>>()?;

        let mut followed: HashSet<TopicId> =
            candidates.followed.iter().map(|topic| topic.tid).collect();
        if !candidates.self_unresolved.is_empty() {
            let self_tids: Vec<TopicId> =
                candidates.self_unresolved.iter().map(|topic| topic.tid).collect();
            let flags = storage
                .is_sorted_set_members(&keys::user_followed_tids(uid), &member_strings(&self_tids))
                .await?;
            for (tid, is_followed) in self_tids.into_iter().zip(flags) {
                if is_followed {
                    followed.insert(tid);
                } else {
                    followed.remove(&tid);
                }
            }
        }

        let ignored: HashSet<TopicId> = ignored.into_iter().collect();
        let outcome = reconcile(&candidates, &ignored, &resolved_times);
        if outcome.tids.is_empty() {
            debug!("uid {}: no unresolved candidates", uid);
            return Ok(UnresolvedData::default());
        }

        let blocked: HashSet<UserId> = forum.blocked_uids(uid).await?.into_iter().collect();
        let scanner = BlockedPostScanner::new(storage, forum, self.config.scan_mode);
        let tids = scanner
            .filter_tids_with_blocked_posts(uid, &outcome.tids, &outcome.scores, &blocked)
            .await?;
        let tids = forum
            .filter_tids(&self.config.read_privilege, &tids, uid)
            .await?;

        let topics: Vec<_> = forum
            .topics_fields(&tids)
            .await?
            .into_iter()
            .flatten()
            .filter(|topic| topic.is_visible())
            .collect();

        let mut cids: Vec<CategoryId> = Vec::new();
        for topic in &topics {
            if topic.cid != 0 && !cids.contains(&topic.cid) {
                cids.push(topic.cid);
            }
        }
        let watch_states = if cids.is_empty() {
            HashMap::new()
        } else {
            let states = forum.watch_states(&cids, uid).await?;
            cids.into_iter().zip(states).collect()
        };

        let (tids_by_filter, counts) = partition(&PartitionInput {
            topics: &topics,
            followed: &followed,
            watch_states: &watch_states,
            blocked: &blocked,
            category_filter: query.cids.as_deref(),
            resolved_times: &resolved_times,
        });
        info!(
            "uid {}: {} unresolved ({} new, {} watched, {} unreplied)",
            uid, counts.all, counts.new, counts.watched, counts.unreplied
        );

        Ok(UnresolvedData {
            counts,
            tids: tids_by_filter.get(query.filter).to_vec(),
            tids_by_filter,
        })
    }

    pub async fn get_unresolved_tids(&self, query: &UnresolvedQuery) -> CoreResult<Vec<TopicId>> {
        Ok(self.get_unresolved_data(query).await?.tids)
    }

    pub async fn get_unresolved_counts(&self, uid: UserId) -> CoreResult<FilterCounts> {
        Ok(self
            .get_unresolved_data(&UnresolvedQuery::for_user(uid))
            .await?
            .counts)
    }

    pub async fn get_total_unresolved(
        &self,
        uid: UserId,
        filter: UnresolvedFilter,
    ) -> CoreResult<usize> {
        Ok(self.get_unresolved_counts(uid).await?.get(filter))
    }

    /// One page of unresolved topics. `topic_count` is the size of the whole
    /// selection, not of the page.
    pub async fn get_unresolved_topics(
        &self,
        query: &UnresolvedQuery,
    ) -> CoreResult<UnresolvedTopicsPage> {
        let mut page = UnresolvedTopicsPage::default();
        let tids = self.get_unresolved_tids(query).await?;
        page.topic_count = tids.len();
        if tids.is_empty() {
            return Ok(page);
        }

        let start = query.start.min(tids.len());
        let end = if query.stop < 0 {
            tids.len()
        } else {
            usize::try_from(query.stop)
                .map_or(tids.len(), |stop| stop.saturating_add(1))
                .clamp(start, tids.len())
        };
        let topics: Vec<IndexedTopic> = self
            .forum
            .topics_fields(&tids[start..end])
            .await?
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, topic)| IndexedTopic {
                topic,
                index: query.start + i,
            })
            .collect();
        if topics.is_empty() {
            return Ok(page);
        }

        page.topics = topics;
        page.next_start = query.stop + 1;
        Ok(page)
    }

    /// Recomputes the user's counts and publishes them to `uid_{uid}`.
    pub async fn push_unresolved_count(&self, uid: UserId) -> CoreResult<()> {
        if uid <= 0 {
            return Ok(());
        }
        let counts = self.get_unresolved_counts(uid).await?;
        self.notifier.push(
            uid,
            EVENT_UNRESOLVED_UPDATE_COUNT,
            UnresolvedCountUpdate::from(counts),
        );
        Ok(())
    }

    /// For each of `tids`, whether `uid` has nothing outstanding on it.
    ///
    /// A topic is resolved when the user has not explicitly reopened it and
    /// either its last activity predates the cutoff or the user resolved it
    /// at or after that activity. Anything else is resolved only if all
    /// activity since the user's resolution comes from blocked authors.
    pub async fn has_resolved_topics(&self, tids: &[TopicId], uid: UserId) -> CoreResult<Vec<bool>> {
        if uid <= 0 || tids.is_empty() {
            return Ok(vec![false; tids.len()]);
        }

        let storage = &*self.storage;
        let members = member_strings(tids);
        let resolved_key = keys::user_resolved_tids(uid);
        let reopened_key = keys::user_unresolved_tids(uid);
        let (topic_scores, user_scores, reopened, blocked) = tokio::try_join!(
            storage.sorted_set_scores(keys::TOPICS_RECENT, &members),
            storage.sorted_set_scores(&resolved_key, &members),
            storage.sorted_set_scores(&reopened_key, &members),
            self.forum.blocked_uids(uid),
        )?;
        let cutoff = resolve_cutoff(&self.hooks, uid, self.now(), self.config.unresolved_cutoff_days)?;
        let blocked: HashSet<UserId> = blocked.into_iter().collect();
        let scanner = BlockedPostScanner::new(storage, &*self.forum, self.config.scan_mode);

        let mut resolved = Vec::with_capacity(tids.len());
        for (i, &tid) in tids.iter().enumerate() {
            if reopened.get(i).copied().flatten().is_some() {
                resolved.push(false);
                continue;
            }
            let topic_score = topic_scores.get(i).copied().flatten();
            let user_score = user_scores.get(i).copied().flatten();
            let settled = topic_score.map_or(false, |score| score < cutoff.timestamp())
                || matches!((user_score, topic_score), (Some(user), Some(topic)) if user >= topic);
            if settled {
                resolved.push(true);
                continue;
            }
            let active = scanner
                .has_unblocked_activity(tid, topic_score, user_score, &blocked)
                .await?;
            resolved.push(!active);
        }
        Ok(resolved)
    }

    pub async fn has_resolved_topic(&self, tid: TopicId, uid: UserId) -> CoreResult<bool> {
        Ok(self
            .has_resolved_topics(&[tid], uid)
            .await?
            .first()
            .copied()
            .unwrap_or(false))
    }

    pub async fn mark_as_resolved(&self, tid: TopicId) -> CoreResult<bool> {
        self.resolution_store().mark_as_resolved(tid).await
    }

    pub async fn mark_as_unresolved(&self, tid: TopicId) -> CoreResult<bool> {
        self.resolution_store().mark_as_unresolved(tid).await
    }

    pub async fn mark_unresolved(&self, tid: TopicId) -> CoreResult<()> {
        self.resolution_store().mark_unresolved(tid).await
    }

    pub async fn resolution_state(&self, tid: TopicId) -> CoreResult<ResolutionState> {
        self.resolution_store().resolution_state(tid).await
    }

    /// Reopens the topic's whole category for every user.
    pub async fn mark_as_unresolved_for_all(&self, tid: TopicId) -> CoreResult<()> {
        let topic = self.forum.topics_fields(&[tid]).await?.into_iter().flatten().next();
        match topic {
            Some(topic) => self.forum.mark_unresolved_for_all(topic.cid).await,
            None => {
                warn!("mark_as_unresolved_for_all: tid {} not found", tid);
                Ok(())
            }
        }
    }

    /// Marks `uid`'s unread notifications about `tids` as read and pushes
    /// the new notification count.
    pub async fn mark_topic_notifications_read(
        &self,
        tids: &[TopicId],
        uid: UserId,
    ) -> CoreResult<()> {
        if tids.is_empty() {
            return Ok(());
        }
        let nids = self.forum.unread_nids_by_tids(uid, tids).await?;
        self.forum.mark_read(&nids, uid).await?;
        debug!("uid {} read {} notifications", uid, nids.len());
        self.forum.push_count(uid).await
    }

    pub async fn mark_topics_resolved_for_user(
        &self,
        uid: UserId,
        tids: &[TopicId],
    ) -> CoreResult<bool> {
        let changed = self
            .resolution_store()
            .mark_topics_resolved_for_user(uid, tids)
            .await?;
        if changed {
            self.push_unresolved_count(uid).await?;
        }
        Ok(changed)
    }

    pub async fn mark_topic_unresolved_for_user(&self, uid: UserId, tid: TopicId) -> CoreResult<()> {
        self.resolution_store()
            .mark_topic_unresolved_for_user(uid, tid)
            .await?;
        self.push_unresolved_count(uid).await
    }
}

impl<S, F> std::fmt::Debug for UnresolvedTracker<S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnresolvedTracker")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
