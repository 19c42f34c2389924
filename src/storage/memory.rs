//! Process-local store repository.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{StorageError, StoreRecord, StoreRepository, StoreUpdate};
use crate::config::StoreName;

/// Store records kept in memory.
///
/// Clones share the same map. Contents are lost when the process exits.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStoreRepository {
    records: Arc<RwLock<HashMap<StoreName, StoreRecord>>>,
}

impl InMemoryStoreRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl StoreRepository for InMemoryStoreRepository {
    async fn get(&self, name: &StoreName) -> Result<Option<StoreRecord>, StorageError> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn create(&self, record: StoreRecord) -> Result<StoreRecord, StorageError> {
        record.check()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.name) {
            return Err(StorageError::Conflict { name: record.name });
        }
        records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        name: &StoreName,
        update: StoreUpdate,
    ) -> Result<StoreRecord, StorageError> {
        let mut records = self.records.write().await;
        let current = records
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { name: name.clone() })?;
        let merged = current.apply(update)?;
        records.insert(name.clone(), merged.clone());
        Ok(merged)
    }

    async fn delete(&self, name: &StoreName) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound { name: name.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreName {
        StoreName::new("shop.example.com").unwrap()
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let repo = InMemoryStoreRepository::new();
        assert!(repo.get(&store()).await.unwrap().is_none());

        repo.create(StoreRecord::pending(store(), "nonce-1"))
            .await
            .unwrap();
        assert_eq!(repo.get(&store()).await.unwrap().unwrap().nonce, "nonce-1");

        let updated = repo
            .update(&store(), StoreUpdate::installed("token"))
            .await
            .unwrap();
        assert!(updated.installed);
        assert_eq!(repo.get(&store()).await.unwrap().unwrap(), updated);

        repo.delete(&store()).await.unwrap();
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = InMemoryStoreRepository::new();
        repo.create(StoreRecord::pending(store(), "a")).await.unwrap();
        let result = repo.create(StoreRecord::pending(store(), "b")).await;
        assert!(matches!(result, Err(StorageError::Conflict { .. })));
        assert_eq!(repo.get(&store()).await.unwrap().unwrap().nonce, "a");
    }

    #[tokio::test]
    async fn test_missing_records_report_not_found() {
        let repo = InMemoryStoreRepository::new();
        assert!(matches!(
            repo.update(&store(), StoreUpdate::restart("n")).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete(&store()).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_unchanged() {
        let repo = InMemoryStoreRepository::new();
        let created = repo
            .create(StoreRecord::pending(store(), "nonce"))
            .await
            .unwrap();
        let bad = StoreUpdate {
            installed: Some(true),
            ..StoreUpdate::default()
        };
        assert!(repo.update(&store(), bad).await.is_err());
        assert_eq!(repo.get(&store()).await.unwrap().unwrap(), created);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let repo = InMemoryStoreRepository::new();
        let clone = repo.clone();
        clone
            .create(StoreRecord::pending(store(), "n"))
            .await
            .unwrap();
        assert_eq!(repo.len().await, 1);
    }
}
