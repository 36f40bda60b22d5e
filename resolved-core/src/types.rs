use serde::{Deserialize, Serialize};
use std::fmt;

pub type TopicId = i64;
pub type UserId = i64;
pub type CategoryId = i64;
pub type PostId = i64;
/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const DAY_MS: i64 = 86_400_000;

/// Upper bound on reconciled candidates, applied before any per-topic lookup.
pub const MAX_UNRESOLVED_CANDIDATES: usize = 200;

/// Posts fetched per page when scanning for unblocked activity.
pub const SCAN_BATCH_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub tid: TopicId,
    pub cid: CategoryId,
    pub uid: UserId,
    pub postcount: u64,
    pub deleted: bool,
    pub scheduled: bool,
}

impl Topic {
    /// Scheduled topics count as live even while flagged deleted.
    pub fn is_visible(&self) -> bool {
        self.scheduled || !self.deleted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub pid: PostId,
    pub uid: UserId,
}

/// A topic id paired with the activity timestamp of some scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredTopic {
    pub tid: TopicId,
    pub score: Timestamp,
}

impl ScoredTopic {
    pub fn new(tid: TopicId, score: Timestamp) -> Self {
        Self { tid, score }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Ignoring,
    NotWatching,
    Tracking,
    Watching,
}

impl Default for WatchState {
    fn default() -> Self {
        WatchState::NotWatching
    }
}

/// Lower horizon for unresolved computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cutoff(pub Timestamp);

impl Cutoff {
    /// No horizon: every timestamp is after it.
    pub const NONE: Cutoff = Cutoff(i64::MIN);

    pub fn timestamp(self) -> Timestamp {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnresolvedFilter {
    #[default]
    #[serde(rename = "")]
    All,
    #[serde(rename = "new")]
    New,
    #[serde(rename = "watched")]
    Watched,
    #[serde(rename = "unreplied")]
    Unreplied,
}

impl UnresolvedFilter {
    pub const ALL: [UnresolvedFilter; 4] = [
        UnresolvedFilter::All,
        UnresolvedFilter::New,
        UnresolvedFilter::Watched,
        UnresolvedFilter::Unreplied,
    ];

    pub fn key(self) -> &'static str {
        match self {
            UnresolvedFilter::All => "",
            UnresolvedFilter::New => "new",
            UnresolvedFilter::Watched => "watched",
            UnresolvedFilter::Unreplied => "unreplied",
        }
    }

    /// Unknown keys fall back to the default bucket.
    pub fn from_key(key: &str) -> Self {
        match key {
            "new" => UnresolvedFilter::New,
            "watched" => UnresolvedFilter::Watched,
            "unreplied" => UnresolvedFilter::Unreplied,
            _ => UnresolvedFilter::All,
        }
    }
}

impl fmt::Display for UnresolvedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCounts {
    #[serde(rename = "")]
    pub all: usize,
    pub new: usize,
    pub watched: usize,
    pub unreplied: usize,
}

impl FilterCounts {
    pub fn get(&self, filter: UnresolvedFilter) -> usize {
        match filter {
            UnresolvedFilter::All => self.all,
            UnresolvedFilter::New => self.new,
            UnresolvedFilter::Watched => self.watched,
            UnresolvedFilter::Unreplied => self.unreplied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TidsByFilter {
    #[serde(rename = "")]
    pub all: Vec<TopicId>,
    pub new: Vec<TopicId>,
    pub watched: Vec<TopicId>,
    pub unreplied: Vec<TopicId>,
}

impl TidsByFilter {
    pub fn get(&self, filter: UnresolvedFilter) -> &[TopicId] {
        match filter {
            UnresolvedFilter::All => &self.all,
            UnresolvedFilter::New => &self.new,
            UnresolvedFilter::Watched => &self.watched,
            UnresolvedFilter::Unreplied => &self.unreplied,
        }
    }

    pub fn counts(&self) -> FilterCounts {
        FilterCounts {
            all: self.all.len(),
            new: self.new.len(),
            watched: self.watched.len(),
            unreplied: self.unreplied.len(),
        }
    }
}

/// Parameters of an unresolved-topics request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnresolvedQuery {
    pub uid: UserId,
    /// Restricts candidates to these categories; `None` uses the user's
    /// watched categories.
    pub cids: Option<Vec<CategoryId>>,
    pub filter: UnresolvedFilter,
    /// Opaque request query forwarded to hooks.
    #[serde(default)]
    pub query: serde_json::Map<String, serde_json::Value>,
    pub start: usize,
    /// Inclusive page end; `-1` reads to the end.
    pub stop: i64,
}

impl UnresolvedQuery {
    pub fn for_user(uid: UserId) -> Self {
        Self {
            uid,
            stop: -1,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: UnresolvedFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_categories(mut self, cids: Vec<CategoryId>) -> Self {
        self.cids = Some(cids);
        self
    }

    pub fn with_page(mut self, start: usize, stop: i64) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnresolvedData {
    pub counts: FilterCounts,
    pub tids: Vec<TopicId>,
    pub tids_by_filter: TidsByFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTopic {
    #[serde(flatten)]
    pub topic: Topic,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedTopicsPage {
    pub show_select: bool,
    pub next_start: i64,
    pub topic_count: usize,
    pub topics: Vec<IndexedTopic>,
}

impl Default for UnresolvedTopicsPage {
    fn default() -> Self {
        Self {
            show_select: true,
            next_start: 0,
            topic_count: 0,
            topics: Vec::new(),
        }
    }
}

/// Per-topic explicit marker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Resolved,
    Unresolved,
    Unmarked,
}

/// Payload pushed to a user's channel after their counts change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedCountUpdate {
    pub unresolved_topic_count: usize,
    pub unresolved_new_topic_count: usize,
    pub unresolved_watched_topic_count: usize,
    pub unresolved_unreplied_topic_count: usize,
}

impl From<FilterCounts> for UnresolvedCountUpdate {
    fn from(counts: FilterCounts) -> Self {
        Self {
            unresolved_topic_count: counts.all,
            unresolved_new_topic_count: counts.new,
            unresolved_watched_topic_count: counts.watched,
            unresolved_unreplied_topic_count: counts.unreplied,
        }
    }
}
