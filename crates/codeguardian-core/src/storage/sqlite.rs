//! SQLite history store
//!
//! One row per analysis. The composite result is stored as a JSON document;
//! the score is duplicated into its own column for ad hoc queries.

use super::HistoryStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use codeguardian_shared::{AnalysisRecord, AnalysisResult, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS code_analyses (
    analysis_id TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    score       INTEGER NOT NULL,
    code        TEXT NOT NULL,
    result      TEXT NOT NULL
)"#;

const CREATE_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_code_analyses_user ON code_analyses (user_id, timestamp DESC)";

/// History store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open or create the database at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Backend {
                    message: format!("failed to create {}: {}", parent.display(), e),
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    /// Private database that lives as long as the store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(backend)?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        // A single connection keeps `:memory:` databases alive and serializes writers
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(backend)?;

        sqlx::query(CREATE_TABLE).execute(&pool).await.map_err(backend)?;
        sqlx::query(CREATE_USER_INDEX).execute(&pool).await.map_err(backend)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, record: AnalysisRecord) -> Result<(), StoreError> {
        let result = serde_json::to_string(&record.result).map_err(|e| StoreError::Backend {
            message: format!("failed to serialize result: {}", e),
        })?;

        sqlx::query(
            "INSERT INTO code_analyses (analysis_id, user_id, timestamp, score, code, result) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.analysis_id.to_string())
        .bind(&record.user_id)
        .bind(format_timestamp(&record.timestamp))
        .bind(i64::from(record.result.score))
        .bind(&record.code)
        .bind(result)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        debug!(analysis_id = %record.analysis_id, "Stored analysis");
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AnalysisRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT analysis_id, user_id, timestamp, code, result FROM code_analyses WHERE user_id = ? ORDER BY timestamp DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT analysis_id, user_id, timestamp, code, result FROM code_analyses WHERE analysis_id = ? AND user_id = ?",
        )
        .bind(analysis_id.to_string())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(record_from_row).transpose()
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend {
        message: error.to_string(),
    }
}

fn corrupt(message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        message: message.into(),
    }
}

/// Fixed-width RFC 3339 so text order matches time order
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: &SqliteRow) -> Result<AnalysisRecord, StoreError> {
    let analysis_id: String = row.try_get("analysis_id").map_err(backend)?;
    let timestamp: String = row.try_get("timestamp").map_err(backend)?;
    let result: String = row.try_get("result").map_err(backend)?;

    let analysis_id = Uuid::parse_str(&analysis_id)
        .map_err(|e| corrupt(format!("bad analysis id {analysis_id}: {e}")))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| corrupt(format!("bad timestamp {timestamp}: {e}")))?
        .with_timezone(&Utc);
    let result: AnalysisResult = serde_json::from_str(&result)
        .map_err(|e| corrupt(format!("bad result document for {analysis_id}: {e}")))?;

    Ok(AnalysisRecord {
        analysis_id,
        user_id: row.try_get("user_id").map_err(backend)?,
        timestamp,
        code: row.try_get("code").map_err(backend)?,
        result,
    })
}
