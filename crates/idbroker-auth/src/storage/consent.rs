//! Consent record storage trait.
//!
//! A consent record holds the attribute keys a user has approved releasing
//! to one service client. Records are keyed by `"{userId}:{serviceClientId}"`
//! and are always replaced as a whole, never merged.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BrokerResult;

/// Builds the storage key of a consent record.
#[must_use]
pub fn consent_key(user_id: &str, service_client_id: &str) -> String {
    format!("{user_id}:{service_client_id}")
}

/// Persisted consent of a user towards a service client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Granted attribute keys.
    pub keys: BTreeSet<String>,
}

impl ConsentRecord {
    /// Creates a record from attribute keys.
    #[must_use]
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Key-value storage for consent records.
///
/// Implementations map their failures to
/// [`BrokerError::ConsentStoreUnavailable`](crate::BrokerError::ConsentStoreUnavailable).
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Reads a record. Returns `None` if no record exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn read(&self, key: &str) -> BrokerResult<Option<ConsentRecord>>;

    /// Inserts a record under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert(&self, key: &str, record: ConsentRecord) -> BrokerResult<()>;

    /// Deletes the record under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, key: &str) -> BrokerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_key() {
        assert_eq!(consent_key("0101011234", "client-1"), "0101011234:client-1");
    }

    #[test]
    fn test_record_serializes_keys() {
        let record = ConsentRecord::new(["name", "cpr"]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"keys": ["cpr", "name"]}));
    }
}
