use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{ProgressKey, ProgressSnapshot, ProgressStore, StoredProgress};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::progress::ActualMastery;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed progress store
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    /// Open (creating if needed) the database at the configured path
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        Self::connect(options, config.max_connections).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // Every pooled connection would get its own in-memory database.
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn get_snapshot(&self, key: &ProgressKey) -> StorageResult<ProgressSnapshot> {
        let rows: Vec<ProgressDbRow> = sqlx::query_as(
            r#"
            SELECT competency_node, estimated_mastery, raw_score, percentage,
                   actual_mastery, is_locked, updated_at
            FROM student_progress
            WHERE student_id = ? AND domain_id = ?
            ORDER BY competency_node ASC
            "#,
        )
        .bind(&key.student_id)
        .bind(key.domain_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(key = %key, nodes = rows.len(), "Loaded progress snapshot");
        rows.into_iter().map(ProgressDbRow::into_entry).collect()
    }

    async fn save_snapshot(&self, key: &ProgressKey, snapshot: &ProgressSnapshot) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM student_progress WHERE student_id = ? AND domain_id = ?")
            .bind(&key.student_id)
            .bind(key.domain_id)
            .execute(&mut *tx)
            .await?;

        for (node, progress) in snapshot {
            sqlx::query(
                r#"
                INSERT INTO student_progress
                    (student_id, domain_id, competency_node, estimated_mastery, raw_score,
                     percentage, actual_mastery, is_locked, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.student_id)
            .bind(key.domain_id)
            .bind(node)
            .bind(progress.estimated_mastery)
            .bind(&progress.raw_score)
            .bind(progress.percentage)
            .bind(progress.actual_mastery.to_string())
            .bind(progress.is_locked)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(key = %key, nodes = snapshot.len(), "Saved progress snapshot");
        Ok(())
    }

    async fn delete_snapshot(&self, key: &ProgressKey) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM student_progress WHERE student_id = ? AND domain_id = ?")
            .bind(&key.student_id)
            .bind(key.domain_id)
            .execute(&self.pool)
            .await?;

        info!(key = %key, removed = result.rows_affected(), "Deleted progress snapshot");
        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct ProgressDbRow {
    competency_node: String,
    estimated_mastery: Option<f64>,
    raw_score: Option<String>,
    percentage: Option<f64>,
    actual_mastery: String,
    is_locked: bool,
    updated_at: String,
}

impl ProgressDbRow {
    fn into_entry(self) -> StorageResult<(String, StoredProgress)> {
        let actual_mastery =
            ActualMastery::from_str(&self.actual_mastery).map_err(|e| StorageError::InvalidData {
                message: format!("{}: {}", self.competency_node, e),
            })?;

        let updated_at = match DateTime::parse_from_rfc3339(&self.updated_at) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(
                    node = %self.competency_node,
                    error = %e,
                    "Ignoring unreadable updated_at"
                );
                None
            }
        };

        Ok((
            self.competency_node,
            StoredProgress {
                estimated_mastery: self.estimated_mastery,
                raw_score: self.raw_score,
                percentage: self.percentage,
                actual_mastery,
                is_locked: self.is_locked,
                updated_at,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(estimate: f64, locked: bool) -> StoredProgress {
        StoredProgress {
            estimated_mastery: Some(estimate),
            raw_score: Some("6/10".to_string()),
            percentage: Some(60.0),
            actual_mastery: ActualMastery::Fail,
            is_locked: locked,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_get_snapshot() {
        let store = SqliteProgressStore::new_in_memory().await.unwrap();
        let key = ProgressKey::new("student-1", 2);

        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert("Estimation".to_string(), progress(0.4, true));

        store.save_snapshot(&key, &snapshot).await.unwrap();
        let loaded = store.get_snapshot(&key).await.unwrap();

        let estimation = loaded.get("Estimation").unwrap();
        assert_eq!(estimation.estimated_mastery, Some(0.4));
        assert_eq!(estimation.actual_mastery, ActualMastery::Fail);
        assert!(estimation.is_locked);
        assert!(estimation.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let store = SqliteProgressStore::new_in_memory().await.unwrap();
        let loaded = store.get_snapshot(&ProgressKey::new("nobody", 1)).await.unwrap();
        assert!(loaded.is_empty());
    }
}
