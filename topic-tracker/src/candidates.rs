//! Raw candidate sets for one user: category activity, followed topics and
//! the user's own explicit unresolved marks.

use crate::hooks::{HookBus, FILTER_CATEGORY_TIDS};
use resolved_core::keys;
use resolved_core::{
    CoreError, CoreResult, Cutoff, DatabaseError, ScoreBound, ScoredMember, ScoredTopic,
    SortedSetStore, TopicId, TopicLookup, UnresolvedFilter, UnresolvedQuery, UserLookup,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub category: Vec<ScoredTopic>,
    pub followed: Vec<ScoredTopic>,
    pub self_unresolved: Vec<ScoredTopic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTidsPayload {
    pub params: UnresolvedQuery,
    pub cutoff: Cutoff,
    pub tids: Vec<ScoredTopic>,
}

pub(crate) fn parse_id(key: &str, member: &str) -> CoreResult<TopicId> {
    member.parse().map_err(|_| {
        CoreError::Database(DatabaseError::InvalidMember {
            key: key.to_string(),
            member: member.to_string(),
        })
    })
}

pub(crate) fn to_scored(key: &str, members: Vec<ScoredMember>) -> CoreResult<Vec<ScoredTopic>> {
    members
        .into_iter()
        .map(|member| Ok(ScoredTopic::new(parse_id(key, &member.value)?, member.score)))
        .collect()
}

pub(crate) fn member_strings(tids: &[TopicId]) -> Vec<String> {
    tids.iter().map(ToString::to_string).collect()
}

fn sort_by_score_desc(topics: &mut [ScoredTopic]) {
    topics.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Topics with last-post time at or after the cutoff in the requested
/// categories, or in the user's watched categories when none are given.
/// Equal scores come back in no particular order.
pub async fn category_candidates<S, U>(
    storage: &S,
    users: &U,
    hooks: &HookBus,
    query: &UnresolvedQuery,
    cutoff: Cutoff,
) -> CoreResult<Vec<ScoredTopic>>
where
    S: SortedSetStore,
    U: UserLookup,
{
    if hooks.has_listeners(FILTER_CATEGORY_TIDS) {
        let payload = hooks.fire_filter(
            FILTER_CATEGORY_TIDS,
            CategoryTidsPayload {
                params: query.clone(),
                cutoff,
                tids: Vec::new(),
            },
        )?;
        return Ok(payload.tids);
    }
    if query.filter == UnresolvedFilter::Watched {
        return Ok(Vec::new());
    }

    let cids = match &query.cids {
        Some(cids) => cids.clone(),
        None => users.watched_categories(query.uid).await?,
    };
    if cids.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = cids
        .iter()
        .map(|&cid| keys::category_tids_by_last_post(cid))
        .collect();
    let members = storage
        .rev_range_by_score_with_scores(
            &keys,
            ScoreBound::Inclusive(cutoff.timestamp()),
            ScoreBound::Unbounded,
        )
        .await?;

    let mut topics = Vec::with_capacity(members.len());
    for member in members {
        topics.push(ScoredTopic::new(
            parse_id("cid:*:tids:lastposttime", &member.value)?,
            member.score,
        ));
    }
    Ok(topics)
}

/// Followed topics scored by global recency, newer than the cutoff and
/// inside the category filter when one is set.
pub async fn followed_candidates<S, T>(
    storage: &S,
    topics: &T,
    query: &UnresolvedQuery,
    cutoff: Cutoff,
) -> CoreResult<Vec<ScoredTopic>>
where
    S: SortedSetStore,
    T: TopicLookup,
{
    let key = keys::user_followed_tids(query.uid);
    let mut tids = storage
        .sorted_set_members(&key)
        .await?
        .iter()
        .map(|member| parse_id(&key, member))
        .collect::<CoreResult<Vec<TopicId>>>()?;

    if let Some(cids) = &query.cids {
        let fields = topics.topics_fields(&tids).await?;
        tids = tids
            .into_iter()
            .zip(fields)
            .filter(|(_, topic)| topic.as_ref().map_or(false, |t| cids.contains(&t.cid)))
            .map(|(tid, _)| tid)
            .collect();
    }
    if tids.is_empty() {
        return Ok(Vec::new());
    }

    let scores = storage
        .sorted_set_scores(keys::TOPICS_RECENT, &member_strings(&tids))
        .await?;
    let mut followed: Vec<ScoredTopic> = tids
        .into_iter()
        .zip(scores)
        .filter_map(|(tid, score)| score.map(|score| ScoredTopic::new(tid, score)))
        .filter(|topic| topic.score > cutoff.timestamp())
        .collect();
    sort_by_score_desc(&mut followed);
    Ok(followed)
}

/// Everything the user explicitly marked unresolved, regardless of cutoff.
pub async fn self_unresolved_candidates<S: SortedSetStore>(
    storage: &S,
    query: &UnresolvedQuery,
) -> CoreResult<Vec<ScoredTopic>> {
    let key = keys::user_unresolved_tids(query.uid);
    let members = storage.rev_range_with_scores(&key).await?;
    to_scored(&key, members)
}

/// Gathers the three candidate sets concurrently.
pub async fn collect_candidates<S, F>(
    storage: &S,
    forum: &F,
    hooks: &HookBus,
    query: &UnresolvedQuery,
    cutoff: Cutoff,
) -> CoreResult<Candidates>
where
    S: SortedSetStore,
    F: TopicLookup + UserLookup,
{
    let (category, followed, self_unresolved) = tokio::try_join!(
        category_candidates(storage, forum, hooks, query, cutoff),
        followed_candidates(storage, forum, query, cutoff),
        self_unresolved_candidates(storage, query),
    )?;
    debug!(
        "uid {} candidates: {} category, {} followed, {} self-unresolved",
        query.uid,
        category.len(),
        followed.len(),
        self_unresolved.len()
    );
    Ok(Candidates {
        category,
        followed,
        self_unresolved,
    })
}
