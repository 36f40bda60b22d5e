//! Resolved / unresolved topic tracking for a discussion forum.
//!
//! Re-exports the workspace crates and wires a SQLite-backed tracker.

pub use database;
pub use resolved_core;
pub use topic_tracker;

pub use database::{Database, MemoryStore};

pub use resolved_core::{CoreError, CoreResult, Forum, TrackerConfig, UnresolvedQuery};
pub use topic_tracker::{HookBus, UnresolvedTracker};

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "resolved_topics=info,topic_tracker=info,database=warn";

/// Installs the global `fmt` subscriber. Fails if `filter` does not parse
/// or a subscriber is already set.
pub fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("bad log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing already initialized: {e}"))
}

/// Connects to `url`, applies migrations and returns the migrated store.
pub async fn open_database(url: &str) -> anyhow::Result<Database> {
    let mut database = Database::new(url.to_string());
    database
        .connect()
        .await
        .with_context(|| format!("connecting to {url}"))?;
    database.run_migrations().await?;
    tracing::info!("Database ready at {}", url);
    Ok(database)
}

/// Builds a tracker over a SQLite store after validating `config`.
pub async fn sqlite_tracker<F: Forum>(
    url: &str,
    forum: Arc<F>,
    config: TrackerConfig,
) -> anyhow::Result<UnresolvedTracker<Database, F>> {
    config.validate()?;
    let database = open_database(url).await?;
    Ok(UnresolvedTracker::new(Arc::new(database), forum, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_filter() {
        assert!(init_tracing("topic_tracker=[").is_err());
    }

    #[tokio::test]
    async fn test_open_database_runs_migrations() {
        let path = std::env::temp_dir().join(format!("resolved_{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let database = open_database(&url).await.unwrap();
        database.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
