//! Analysis History Storage
//!
//! This module persists analysis reports per user:
//! - The HistoryStore trait the engine depends on
//! - An in-memory store for tests and one-shot runs
//! - A SQLite store (feature `database`) for the CLI

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryHistoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteHistoryStore;

use async_trait::async_trait;
use codeguardian_shared::{AnalysisRecord, StorageBackend, StorageConfig, StoreError};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Append-only store of analysis records, keyed by user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a new record
    async fn append(&self, record: AnalysisRecord) -> Result<(), StoreError>;

    /// All records of a user, newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AnalysisRecord>, StoreError>;

    /// One record, only if it belongs to `user_id`
    async fn get(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError>;
}

/// Open the store selected in the configuration
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn HistoryStore>, StoreError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory history store");
            Ok(Arc::new(MemoryHistoryStore::new()))
        }
        #[cfg(feature = "database")]
        StorageBackend::Sqlite => {
            let path = config.resolved_sqlite_path();
            info!("Using SQLite history store at {}", path.display());
            Ok(Arc::new(SqliteHistoryStore::open(&path).await?))
        }
        #[cfg(not(feature = "database"))]
        StorageBackend::Sqlite => Err(StoreError::Unsupported {
            backend: "sqlite".to_string(),
        }),
    }
}
