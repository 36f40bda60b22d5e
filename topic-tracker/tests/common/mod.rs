#![allow(dead_code)]

use database::MemoryStore;
use resolved_core::keys;
use resolved_core::{
    CategoryId, CategoryLookup, CoreResult, NotificationStore, PostAuthor, PostId, PostLookup,
    PrivilegeFilter, SortedSetStore, Timestamp, Topic, TopicId, TopicLookup, TrackerConfig, UserId, UserLookup,
    WatchState, DAY_MS,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use topic_tracker::UnresolvedTracker;

pub const NOW: Timestamp = 100 * DAY_MS;

/// In-memory stand-in for the topic, post, user, category and privilege
/// collaborators.
#[derive(Default)]
pub struct FixtureForum {
    topics: Mutex<HashMap<TopicId, Topic>>,
    post_authors: Mutex<HashMap<PostId, UserId>>,
    blocked: Mutex<HashMap<UserId, Vec<UserId>>>,
    ignored: Mutex<HashMap<UserId, Vec<TopicId>>>,
    watched_categories: Mutex<HashMap<UserId, Vec<CategoryId>>>,
    watch_states: Mutex<HashMap<(UserId, CategoryId), WatchState>>,
    denied: Mutex<HashSet<TopicId>>,
    privileges_checked: Mutex<Vec<String>>,
    reopened_categories: Mutex<Vec<CategoryId>>,
    /// Notifications as (nid, uid, tid, read).
    notifications: Mutex<Vec<(String, UserId, TopicId, bool)>>,
    notification_pushes: Mutex<Vec<UserId>>,
}

impl FixtureForum {
    pub fn add_topic(&self, topic: Topic) {
        self.topics.lock().unwrap().insert(topic.tid, topic);
    }

    pub fn update_topic(&self, tid: TopicId, update: impl FnOnce(&mut Topic)) {
        if let Some(topic) = self.topics.lock().unwrap().get_mut(&tid) {
            update(topic);
        }
    }

    pub fn set_post_author(&self, pid: PostId, uid: UserId) {
        self.post_authors.lock().unwrap().insert(pid, uid);
    }

    pub fn block(&self, uid: UserId, blocked: UserId) {
        self.blocked.lock().unwrap().entry(uid).or_default().push(blocked);
    }

    pub fn ignore(&self, uid: UserId, tid: TopicId) {
        self.ignored.lock().unwrap().entry(uid).or_default().push(tid);
    }

    /// Adds `cid` to the user's watched categories and sets its state.
    pub fn watch_category(&self, uid: UserId, cid: CategoryId, state: WatchState) {
        self.watched_categories
            .lock()
            .unwrap()
            .entry(uid)
            .or_default()
            .push(cid);
        self.watch_states.lock().unwrap().insert((uid, cid), state);
    }

    pub fn deny(&self, tid: TopicId) {
        self.denied.lock().unwrap().insert(tid);
    }

    pub fn privileges_checked(&self) -> Vec<String> {
        self.privileges_checked.lock().unwrap().clone()
    }

    pub fn reopened_categories(&self) -> Vec<CategoryId> {
        self.reopened_categories.lock().unwrap().clone()
    }

    pub fn notify(&self, nid: &str, uid: UserId, tid: TopicId) {
        self.notifications
            .lock()
            .unwrap()
            .push((nid.to_string(), uid, tid, false));
    }

    pub fn unread_nids(&self, uid: UserId) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, owner, _, read)| *owner == uid && !read)
            .map(|(nid, ..)| nid.clone())
            .collect()
    }

    pub fn notification_pushes(&self) -> Vec<UserId> {
        self.notification_pushes.lock().unwrap().clone()
    }
}

impl TopicLookup for FixtureForum {
    async fn topics_fields(&self, tids: &[TopicId]) -> CoreResult<Vec<Option<Topic>>> {
        let topics = self.topics.lock().unwrap();
        Ok(tids.iter().map(|tid| topics.get(tid).cloned()).collect())
    }

    async fn topic_exists(&self, tid: TopicId) -> CoreResult<bool> {
        Ok(self.topics.lock().unwrap().contains_key(&tid))
    }
}

impl PostLookup for FixtureForum {
    async fn post_authors(&self, pids: &[PostId]) -> CoreResult<Vec<PostAuthor>> {
        let authors = self.post_authors.lock().unwrap();
        Ok(pids
            .iter()
            .filter_map(|&pid| authors.get(&pid).map(|&uid| PostAuthor { pid, uid }))
            .collect())
    }
}

impl UserLookup for FixtureForum {
    async fn blocked_uids(&self, uid: UserId) -> CoreResult<Vec<UserId>> {
        Ok(self.blocked.lock().unwrap().get(&uid).cloned().unwrap_or_default())
    }

    async fn ignored_tids(&self, uid: UserId) -> CoreResult<Vec<TopicId>> {
        Ok(self.ignored.lock().unwrap().get(&uid).cloned().unwrap_or_default())
    }

    async fn watched_categories(&self, uid: UserId) -> CoreResult<Vec<CategoryId>> {
        Ok(self
            .watched_categories
            .lock()
            .unwrap()
            .get(&uid)
            .cloned()
            .unwrap_or_default())
    }
}

impl CategoryLookup for FixtureForum {
    async fn watch_states(&self, cids: &[CategoryId], uid: UserId) -> CoreResult<Vec<WatchState>> {
        let states = self.watch_states.lock().unwrap();
        Ok(cids
            .iter()
            .map(|&cid| states.get(&(uid, cid)).copied().unwrap_or_default())
            .collect())
    }

    async fn mark_unresolved_for_all(&self, cid: CategoryId) -> CoreResult<()> {
        self.reopened_categories.lock().unwrap().push(cid);
        Ok(())
    }
}

impl PrivilegeFilter for FixtureForum {
    async fn filter_tids(
        &self,
        privilege: &str,
        tids: &[TopicId],
        _uid: UserId,
    ) -> CoreResult<Vec<TopicId>> {
        self.privileges_checked
            .lock()
            .unwrap()
            .push(privilege.to_string());
        let denied = self.denied.lock().unwrap();
        Ok(tids.iter().copied().filter(|tid| !denied.contains(tid)).collect())
    }
}

impl NotificationStore for FixtureForum {
    async fn unread_nids_by_tids(&self, uid: UserId, tids: &[TopicId]) -> CoreResult<Vec<String>> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, owner, tid, read)| *owner == uid && !read && tids.contains(tid))
            .map(|(nid, ..)| nid.clone())
            .collect())
    }

    async fn mark_read(&self, nids: &[String], uid: UserId) -> CoreResult<()> {
        for (nid, owner, _, read) in self.notifications.lock().unwrap().iter_mut() {
            if *owner == uid && nids.contains(nid) {
                *read = true;
            }
        }
        Ok(())
    }

    async fn push_count(&self, uid: UserId) -> CoreResult<()> {
        self.notification_pushes.lock().unwrap().push(uid);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub forum: Arc<FixtureForum>,
}

impl Harness {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("topic_tracker=debug")
            .with_test_writer()
            .try_init();
        Self {
            store: Arc::new(MemoryStore::new()),
            forum: Arc::new(FixtureForum::default()),
        }
    }

    pub fn tracker(&self, config: TrackerConfig) -> UnresolvedTracker<MemoryStore, FixtureForum> {
        UnresolvedTracker::new(self.store.clone(), self.forum.clone(), config)
            .with_clock(Arc::new(|| NOW))
    }

    /// Creates a topic whose last post landed at `last_post`.
    pub async fn topic(
        &self,
        tid: TopicId,
        cid: CategoryId,
        author: UserId,
        postcount: u64,
        last_post: Timestamp,
    ) {
        self.forum.add_topic(Topic {
            tid,
            cid,
            uid: author,
            postcount,
            deleted: false,
            scheduled: false,
        });
        let member = tid.to_string();
        self.store
            .sorted_set_add(&keys::category_tids_by_last_post(cid), last_post, &member)
            .await
            .unwrap();
        self.store
            .sorted_set_add(keys::TOPICS_RECENT, last_post, &member)
            .await
            .unwrap();
    }

    pub async fn post(&self, tid: TopicId, pid: PostId, author: UserId, at: Timestamp) {
        self.forum.set_post_author(pid, author);
        self.store
            .sorted_set_add(&keys::topic_posts(tid), at, &pid.to_string())
            .await
            .unwrap();
    }

    pub async fn follow(&self, uid: UserId, tid: TopicId) {
        self.store
            .sorted_set_add(&keys::user_followed_tids(uid), 0, &tid.to_string())
            .await
            .unwrap();
    }

    pub async fn resolve(&self, uid: UserId, tid: TopicId, at: Timestamp) {
        self.store
            .sorted_set_add(&keys::user_resolved_tids(uid), at, &tid.to_string())
            .await
            .unwrap();
    }
}
