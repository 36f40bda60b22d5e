//! Sorted-set and set storage backed by SQLite.

mod memory;
#[cfg(test)]
mod tests;

pub use memory::MemoryStore;

use resolved_core::{
    CoreError, CoreResult, DatabaseError, ScoreBound, ScoredMember, SetStore, SortedSetStore,
    Timestamp,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_sorted_set",
        "CREATE TABLE IF NOT EXISTS sorted_set (
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            score INTEGER NOT NULL,
            PRIMARY KEY (key, member)
        )",
    ),
    (
        "index_sorted_set_score",
        "CREATE INDEX IF NOT EXISTS idx_sorted_set_key_score ON sorted_set (key, score)",
    ),
    (
        "create_plain_set",
        "CREATE TABLE IF NOT EXISTS plain_set (
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (key, member)
        )",
    ),
];

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for (name, statement) in MIGRATIONS {
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                tracing::error!("Migration {} failed: {}", name, e);
                DatabaseError::MigrationFailed {
                    migration: name.to_string(),
                }
            })?;
            debug!("Applied migration {}", name);
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or(CoreError::Database(DatabaseError::NotConnected))
    }
}

/// Appends `AND score ...` clauses for the given bounds.
fn push_score_bounds(sql: &mut String, binds: &mut Vec<i64>, min: ScoreBound, max: ScoreBound) {
    match min {
        ScoreBound::Inclusive(value) => {
            sql.push_str(" AND score >= ?");
            binds.push(value);
        }
        ScoreBound::Exclusive(value) => {
            sql.push_str(" AND score > ?");
            binds.push(value);
        }
        ScoreBound::Unbounded => {}
    }
    match max {
        ScoreBound::Inclusive(value) => {
            sql.push_str(" AND score <= ?");
            binds.push(value);
        }
        ScoreBound::Exclusive(value) => {
            sql.push_str(" AND score < ?");
            binds.push(value);
        }
        ScoreBound::Unbounded => {}
    }
}

impl SortedSetStore for Database {
    async fn sorted_set_add(&self, key: &str, score: Timestamp, member: &str) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO sorted_set (key, member, score) VALUES (?, ?, ?)
             ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
        )
        .bind(key)
        .bind(member)
        .bind(score)
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM sorted_set WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn sorted_set_members(&self, key: &str) -> CoreResult<Vec<String>> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT member FROM sorted_set WHERE key = ? ORDER BY score ASC, member ASC",
        )
        .bind(key)
        .fetch_all(self.pool()?)
        .await?;
        Ok(members)
    }

    async fn sorted_set_scores(
        &self,
        key: &str,
        members: &[String],
    ) -> CoreResult<Vec<Option<Timestamp>>> {
        let pool = self.pool()?;
        let mut scores = Vec::with_capacity(members.len());
        for member in members {
            let score = sqlx::query_scalar::<_, i64>(
                "SELECT score FROM sorted_set WHERE key = ? AND member = ?",
            )
            .bind(key)
            .bind(member)
            .fetch_optional(pool)
            .await?;
            scores.push(score);
        }
        Ok(scores)
    }

    async fn is_sorted_set_members(
        &self,
        key: &str,
        members: &[String],
    ) -> CoreResult<Vec<bool>> {
        let scores = self.sorted_set_scores(key, members).await?;
        Ok(scores.into_iter().map(|score| score.is_some()).collect())
    }

    async fn rev_range_by_score_with_scores(
        &self,
        keys: &[String],
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<ScoredMember>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let mut sql = format!(
            "SELECT member, MAX(score) AS score FROM sorted_set WHERE key IN ({})",
            placeholders
        );
        let mut binds = Vec::new();
        push_score_bounds(&mut sql, &mut binds, min, max);
        sql.push_str(" GROUP BY member ORDER BY score DESC");

        let mut query = sqlx::query_as::<_, (String, i64)>(&sql);
        for key in keys {
            query = query.bind(key);
        }
        for value in binds {
            query = query.bind(value);
        }

        let rows = query.fetch_all(self.pool()?).await?;
        Ok(rows
            .into_iter()
            .map(|(value, score)| ScoredMember { value, score })
            .collect())
    }

    async fn rev_range_with_scores(&self, key: &str) -> CoreResult<Vec<ScoredMember>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT member, score FROM sorted_set WHERE key = ? ORDER BY score DESC",
        )
        .bind(key)
        .fetch_all(self.pool()?)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(value, score)| ScoredMember { value, score })
            .collect())
    }

    async fn range_by_score(
        &self,
        key: &str,
        start: usize,
        count: usize,
        min: ScoreBound,
        max: ScoreBound,
    ) -> CoreResult<Vec<String>> {
        let mut sql = String::from("SELECT member FROM sorted_set WHERE key = ?");
        let mut binds = Vec::new();
        push_score_bounds(&mut sql, &mut binds, min, max);
        sql.push_str(" ORDER BY score ASC, member ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(key);
        for value in binds {
            query = query.bind(value);
        }
        let members = query
            .bind(count as i64)
            .bind(start as i64)
            .fetch_all(self.pool()?)
            .await?;
        Ok(members)
    }
}

impl SetStore for Database {
    async fn set_add(&self, key: &str, member: &str) -> CoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO plain_set (key, member) VALUES (?, ?)")
            .bind(key)
            .bind(member)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM plain_set WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn is_set_member(&self, key: &str, member: &str) -> CoreResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM plain_set WHERE key = ? AND member = ?",
        )
        .bind(key)
        .bind(member)
        .fetch_one(self.pool()?)
        .await?;
        Ok(found > 0)
    }

    async fn set_members(&self, key: &str) -> CoreResult<Vec<String>> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT member FROM plain_set WHERE key = ? ORDER BY member ASC",
        )
        .bind(key)
        .fetch_all(self.pool()?)
        .await?;
        Ok(members)
    }
}
