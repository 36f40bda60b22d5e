//! Re-checks topics with unread activity against the user's block list.
//!
//! A topic whose only new posts come from blocked authors should not count
//! as unresolved. The scanner pages through the posts after the user's last
//! resolution time looking for one by an unblocked author.

use crate::candidates::{member_strings, parse_id};
use futures::future::try_join_all;
use resolved_core::keys;
use resolved_core::{
    CoreResult, PostId, PostLookup, ScanMode, ScoreBound, SortedSetStore, Timestamp, TopicId,
    UserId, SCAN_BATCH_SIZE,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct BlockedPostScanner<'a, S, P> {
    storage: &'a S,
    posts: &'a P,
    mode: ScanMode,
}

impl<'a, S, P> BlockedPostScanner<'a, S, P>
where
    S: SortedSetStore,
    P: PostLookup,
{
    pub fn new(storage: &'a S, posts: &'a P, mode: ScanMode) -> Self {
        Self {
            storage,
            posts,
            mode,
        }
    }

    /// Whether `tid` has activity after `user_last_resolved` that is not
    /// authored exclusively by `blocked` users.
    ///
    /// A topic the user never resolved always qualifies. Without blocked
    /// authors the answer is the plain timestamp comparison. Otherwise posts
    /// are read [`SCAN_BATCH_SIZE`] at a time, oldest first:
    ///
    /// - [`ScanMode::Exhaustive`] keeps paging until it finds an unblocked
    ///   post or runs out. Running out after at least one page means every
    ///   unread post was blocked.
    /// - [`ScanMode::FirstPage`] decides on the first page that has posts.
    ///
    /// If the very first page is empty the timestamp comparison stands.
    pub async fn has_unblocked_activity(
        &self,
        tid: TopicId,
        topic_last_activity: Option<Timestamp>,
        user_last_resolved: Option<Timestamp>,
        blocked: &HashSet<UserId>,
    ) -> CoreResult<bool> {
        let Some(resolved) = user_last_resolved else {
            return Ok(true);
        };
        let coarse = topic_last_activity.map_or(false, |activity| activity > resolved);
        if blocked.is_empty() {
            return Ok(coarse);
        }

        let key = keys::topic_posts(tid);
        let mut start = 0;
        let mut pages = 0usize;
        loop {
            let members = self
                .storage
                .range_by_score(
                    &key,
                    start,
                    SCAN_BATCH_SIZE,
                    ScoreBound::Exclusive(resolved),
                    ScoreBound::Unbounded,
                )
                .await?;
            if members.is_empty() {
                return Ok(if pages == 0 { coarse } else { false });
            }
            pages += 1;

            let pids = members
                .iter()
                .map(|member| parse_id(&key, member))
                .collect::<CoreResult<Vec<PostId>>>()?;
            // A post without an author record cannot be from a blocked user.
            let authors = self.posts.post_authors(&pids).await?;
            let authored: HashSet<PostId> = authors.iter().map(|post| post.pid).collect();
            if pids.iter().any(|pid| !authored.contains(pid))
                || authors.iter().any(|post| !blocked.contains(&post.uid))
            {
                return Ok(true);
            }
            if self.mode == ScanMode::FirstPage {
                debug!("tid {}: first unread page all blocked, stopping", tid);
                return Ok(false);
            }
            start += SCAN_BATCH_SIZE;
        }
    }

    /// Keeps the topics of `tids` that still have unblocked unread activity
    /// for `uid`, in their original order. Topics are checked concurrently.
    pub async fn filter_tids_with_blocked_posts(
        &self,
        uid: UserId,
        tids: &[TopicId],
        topic_scores: &HashMap<TopicId, Timestamp>,
        blocked: &HashSet<UserId>,
    ) -> CoreResult<Vec<TopicId>> {
        if blocked.is_empty() || tids.is_empty() {
            return Ok(tids.to_vec());
        }

        let resolved = self
            .storage
            .sorted_set_scores(&keys::user_resolved_tids(uid), &member_strings(tids))
            .await?;
        let keep = try_join_all(tids.iter().zip(&resolved).map(|(&tid, &last_resolved)| {
            self.has_unblocked_activity(tid, topic_scores.get(&tid).copied(), last_resolved, blocked)
        }))
        .await?;

        let kept: Vec<TopicId> = tids
            .iter()
            .zip(keep)
            .filter_map(|(&tid, keep)| keep.then_some(tid))
            .collect();
        debug!(
            "uid {}: {} of {} topics kept after block scan",
            uid,
            kept.len(),
            tids.len()
        );
        Ok(kept)
    }
}
