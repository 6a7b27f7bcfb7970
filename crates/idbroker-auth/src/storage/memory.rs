//! In-memory consent store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::consent::{ConsentRecord, ConsentStore};
use crate::BrokerResult;

/// Consent store backed by a concurrent map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryConsentStore {
    records: DashMap<String, ConsentRecord>,
}

impl InMemoryConsentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn read(&self, key: &str) -> BrokerResult<Option<ConsentRecord>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, key: &str, record: ConsentRecord) -> BrokerResult<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BrokerResult<()> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_read_delete() {
        let store = InMemoryConsentStore::new();
        assert!(store.read("u:c").await.unwrap().is_none());

        store
            .insert("u:c", ConsentRecord::new(["cpr"]))
            .await
            .unwrap();
        assert_eq!(
            store.read("u:c").await.unwrap(),
            Some(ConsentRecord::new(["cpr"]))
        );
        assert_eq!(store.len(), 1);

        store.delete("u:c").await.unwrap();
        assert!(store.read("u:c").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let store = InMemoryConsentStore::new();
        assert!(store.delete("nobody:nothing").await.is_ok());
    }
}
