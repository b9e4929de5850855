//! Key-value storage for pending verification codes.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::StoredCode;
use crate::error::Error;

/// Trait for a TTL-capable key-value store holding verification codes.
///
/// Keys are the `username@host` form of an identity handle. Implementations
/// may evict records once `expires_at` has passed but are not required to;
/// the code store deletes expired records on read.
#[async_trait]
pub trait CodeStorage: Send + Sync {
    /// Retrieve the record stored under `key`, expired or not.
    async fn get(&self, key: &str) -> Result<Option<StoredCode>, Error>;

    /// Insert or replace the record stored under `key`.
    async fn put(&self, key: &str, record: StoredCode) -> Result<(), Error>;

    /// Delete the record stored under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Delete every record that is expired at `now_millis` and older than
    /// `min_reissue_millis`, returning how many went.
    async fn purge_expired(
        &self,
        now_millis: i64,
        min_reissue_millis: i64,
    ) -> Result<usize, Error>;
}

/// In-process storage backed by a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<DashMap<String, StoredCode>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CodeStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<StoredCode>, Error> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, record: StoredCode) -> Result<(), Error> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.records.remove(key);
        Ok(())
    }

    async fn purge_expired(
        &self,
        now_millis: i64,
        min_reissue_millis: i64,
    ) -> Result<usize, Error> {
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.is_stale_at(now_millis, min_reissue_millis));
        Ok(before.saturating_sub(self.records.len()))
    }
}
