//! In-memory history store

use super::HistoryStore;
use async_trait::async_trait;
use codeguardian_shared::{AnalysisRecord, StoreError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: AnalysisRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.analysis_id == record.analysis_id) {
            return Err(StoreError::Backend {
                message: format!("analysis {} already exists", record.analysis_id),
            });
        }
        records.push(record);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AnalysisRecord>, StoreError> {
        let records = self.records.read().await;

        // Newest insert first among equal timestamps
        let mut owned: Vec<AnalysisRecord> = records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(owned)
    }

    async fn get(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.analysis_id == analysis_id && r.user_id == user_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use codeguardian_shared::AnalysisResult;

    fn record_at(user: &str, minutes_ago: i64) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(user, "let value = 42;", AnalysisResult::default());
        record.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryHistoryStore::new();
        let old = record_at("ada", 30);
        let new = record_at("ada", 1);
        let middle = record_at("ada", 10);
        let other = record_at("grace", 0);

        for record in [old.clone(), new.clone(), middle.clone(), other] {
            store.append(record).await.unwrap();
        }

        let ids: Vec<Uuid> = store
            .list_for_user("ada")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.analysis_id)
            .collect();
        assert_eq!(ids, vec![new.analysis_id, middle.analysis_id, old.analysis_id]);
    }

    #[tokio::test]
    async fn test_get_is_scoped_to_owner() {
        let store = MemoryHistoryStore::new();
        let record = record_at("ada", 0);
        let id = record.analysis_id;
        store.append(record.clone()).await.unwrap();

        assert_eq!(store.get("ada", id).await.unwrap(), Some(record));
        assert_eq!(store.get("grace", id).await.unwrap(), None);
        assert_eq!(store.get("ada", Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryHistoryStore::new();
        let record = record_at("ada", 0);
        store.append(record.clone()).await.unwrap();

        assert!(matches!(
            store.append(record).await,
            Err(StoreError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let store = MemoryHistoryStore::new();
        assert!(store.list_for_user("nobody").await.unwrap().is_empty());
    }
}
