//! Verification code store with per-handle locking.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{generate_code, CodeStorage, StoredCode, VerificationCode};
use crate::error::{verification_error, Error, VerificationErrorKind};
use crate::identity::IdentityHandle;

/// Lifetime and issuance limits for verification codes.
#[derive(Debug, Clone, Copy)]
pub struct CodePolicy {
    /// How long a code stays redeemable.
    pub ttl: Duration,
    /// Minimum time between two issuances for the same handle. Applies even
    /// when the earlier code has already expired.
    pub min_reissue_interval: Duration,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            min_reissue_interval: Duration::minutes(10),
        }
    }
}

/// Store for pending verification codes, at most one per identity handle.
///
/// Every operation on a handle runs under that handle's lock, so two
/// concurrent `create` calls cannot both observe an empty slot, and a lazy
/// expiry in `get` cannot delete a record that a concurrent `create` just
/// wrote.
pub struct CodeStore<S: CodeStorage> {
    storage: S,
    policy: CodePolicy,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: CodeStorage> CodeStore<S> {
    /// Create a new code store with the default policy.
    pub fn new(storage: S) -> Self {
        Self::with_policy(storage, CodePolicy::default())
    }

    /// Create a new code store with a custom policy.
    pub fn with_policy(storage: S, policy: CodePolicy) -> Self {
        Self {
            storage,
            policy,
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> CodePolicy {
        self.policy
    }

    /// Fetch the pending code for `handle`.
    ///
    /// An expired record is reported as `NotFound`, exactly as if it had
    /// never existed, and deleted as a side effect once the minimum re-issue
    /// interval no longer needs its issue time.
    pub async fn get(&self, handle: &IdentityHandle) -> Result<VerificationCode, Error> {
        let key = handle.key();
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let stored = self
            .storage
            .get(&key)
            .await?
            .ok_or_else(|| verification_error(VerificationErrorKind::NotFound, "No code"))?;

        if stored.is_expired_at(Utc::now().timestamp_millis()) {
            debug!("Verification code for {} expired", key);
            self.expire(&key, &stored).await?;
            return Err(verification_error(VerificationErrorKind::NotFound, "No code"));
        }

        VerificationCode::from_stored(handle.clone(), stored)
    }

    /// Issue a fresh code for `handle` and return it.
    ///
    /// Fails with `TooFrequent` while a previous code is still redeemable, or
    /// while the previous issuance is younger than the minimum re-issue
    /// interval.
    pub async fn create(&self, handle: &IdentityHandle) -> Result<String, Error> {
        let key = handle.key();
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let now = Utc::now().timestamp_millis();

        if let Some(existing) = self.storage.get(&key).await? {
            if !existing.is_stale_at(now, self.min_reissue_millis()) {
                debug!("Refusing to re-issue verification code for {}", key);
                return Err(verification_error(
                    VerificationErrorKind::TooFrequent,
                    "too_frequent",
                ));
            }
        }

        let code = generate_code();
        let record = StoredCode {
            code: code.clone(),
            issued_at: now,
            expires_at: now + self.policy.ttl.num_milliseconds(),
        };
        self.storage.put(&key, record).await?;

        debug!("Issued verification code for {}", key);
        Ok(code)
    }

    /// Consume the pending code for `handle` if `submitted` matches it.
    ///
    /// Check and delete happen under one lock, so a code can be redeemed at
    /// most once. A mismatch leaves the code in place.
    pub async fn redeem(
        &self,
        handle: &IdentityHandle,
        submitted: &str,
    ) -> Result<VerificationCode, Error> {
        let key = handle.key();
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let stored = self
            .storage
            .get(&key)
            .await?
            .ok_or_else(|| verification_error(VerificationErrorKind::NotFound, "No code"))?;

        if stored.is_expired_at(Utc::now().timestamp_millis()) {
            self.expire(&key, &stored).await?;
            return Err(verification_error(VerificationErrorKind::NotFound, "No code"));
        }

        let pending = VerificationCode::from_stored(handle.clone(), stored)?;
        if !pending.matches(submitted) {
            debug!("Wrong code submitted for {}", key);
            return Err(verification_error(
                VerificationErrorKind::CodeMismatch,
                "Invalid code",
            ));
        }

        self.storage.delete(&key).await?;
        Ok(pending)
    }

    /// Delete the code for `handle`. Idempotent.
    pub async fn remove(&self, handle: &IdentityHandle) -> Result<(), Error> {
        let key = handle.key();
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        self.storage.delete(&key).await
    }

    /// Delete every expired record and drop idle per-handle locks.
    ///
    /// Not required for correctness; the binary runs it periodically so
    /// abandoned flows do not accumulate.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        let purged = self
            .storage
            .purge_expired(Utc::now().timestamp_millis(), self.min_reissue_millis())
            .await?;
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(purged)
    }

    // Caller holds the handle's lock.
    async fn expire(&self, key: &str, stored: &StoredCode) -> Result<(), Error> {
        if stored.is_stale_at(Utc::now().timestamp_millis(), self.min_reissue_millis()) {
            self.storage.delete(key).await?;
        }
        Ok(())
    }

    fn min_reissue_millis(&self) -> i64 {
        self.policy.min_reissue_interval.num_milliseconds()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::verification::MemoryStorage;

    fn handle() -> IdentityHandle {
        IdentityHandle::new("alice", "example.social").unwrap()
    }

    fn expiring_policy() -> CodePolicy {
        CodePolicy {
            ttl: Duration::seconds(-1),
            min_reissue_interval: Duration::zero(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_returns_same_code() {
        let store = CodeStore::new(MemoryStorage::new());

        let code = store.create(&handle()).await.unwrap();
        let fetched = store.get(&handle()).await.unwrap();

        assert_eq!(fetched.code, code);
        assert_eq!(fetched.handle, handle());
        assert_eq!(
            (fetched.expires_at - fetched.issued_at).num_minutes(),
            60
        );
    }

    #[tokio::test]
    async fn test_leading_zeros_survive_storage() {
        let storage = MemoryStorage::new();
        let store = CodeStore::new(storage.clone());
        let now = Utc::now().timestamp_millis();
        storage
            .put(
                "alice@example.social",
                StoredCode {
                    code: "00042".to_string(),
                    issued_at: now,
                    expires_at: now + 60_000,
                },
            )
            .await
            .unwrap();

        let fetched = store.get(&handle()).await.unwrap();
        assert_eq!(fetched.code, "00042");
    }

    #[tokio::test]
    async fn test_second_create_within_ttl_is_too_frequent() {
        let store = CodeStore::new(MemoryStorage::new());

        store.create(&handle()).await.unwrap();
        let err = store.create(&handle()).await.unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::TooFrequent)
        );
    }

    #[tokio::test]
    async fn test_expired_get_is_not_found_and_allows_create() {
        let storage = MemoryStorage::new();
        let store = CodeStore::with_policy(storage.clone(), expiring_policy());

        store.create(&handle()).await.unwrap();
        let err = store.get(&handle()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::NotFound)
        );
        assert!(storage.is_empty());

        assert!(store.create(&handle()).await.is_ok());
    }

    #[tokio::test]
    async fn test_min_reissue_interval_applies_after_expiry() {
        let policy = CodePolicy {
            ttl: Duration::seconds(-1),
            min_reissue_interval: Duration::minutes(10),
        };
        let store = CodeStore::with_policy(MemoryStorage::new(), policy);

        store.create(&handle()).await.unwrap();
        let err = store.create(&handle()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::TooFrequent)
        );
    }

    #[tokio::test]
    async fn test_min_reissue_interval_survives_lazy_expiry_and_purge() {
        let policy = CodePolicy {
            ttl: Duration::seconds(-1),
            min_reissue_interval: Duration::minutes(10),
        };
        let store = CodeStore::with_policy(MemoryStorage::new(), policy);

        store.create(&handle()).await.unwrap();
        assert!(store.get(&handle()).await.is_err());
        assert_eq!(store.purge_expired().await.unwrap(), 0);

        let err = store.create(&handle()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::TooFrequent)
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_frees_handle() {
        let store = CodeStore::new(MemoryStorage::new());

        store.create(&handle()).await.unwrap();
        store.remove(&handle()).await.unwrap();
        store.remove(&handle()).await.unwrap();

        assert!(store.get(&handle()).await.is_err());
        assert!(store.create(&handle()).await.is_ok());
    }

    #[tokio::test]
    async fn test_username_case_shares_one_slot() {
        let store = CodeStore::new(MemoryStorage::new());
        let shouting = IdentityHandle::new("Alice", "EXAMPLE.social").unwrap();

        store.create(&handle()).await.unwrap();
        let err = store.create(&shouting).await.unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::TooFrequent)
        );
    }

    #[tokio::test]
    async fn test_handles_are_independent() {
        let store = CodeStore::new(MemoryStorage::new());
        let bob = IdentityHandle::new("bob", "example.social").unwrap();

        store.create(&handle()).await.unwrap();
        assert!(store.create(&bob).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_creates_only_one_succeeds() {
        let store = Arc::new(CodeStore::new(MemoryStorage::new()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(&handle()).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_redeem_is_single_use_and_mismatch_keeps_code() {
        let store = CodeStore::new(MemoryStorage::new());
        let code = store.create(&handle()).await.unwrap();
        let wrong = if code == "99999" { "00000" } else { "99999" };

        let err = store.redeem(&handle(), wrong).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::CodeMismatch)
        );

        assert_eq!(store.redeem(&handle(), &code).await.unwrap().code, code);
        let err = store.redeem(&handle(), &code).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Verification(VerificationErrorKind::NotFound)
        );
    }

    #[tokio::test]
    async fn test_concurrent_redeems_only_one_succeeds() {
        let store = Arc::new(CodeStore::new(MemoryStorage::new()));
        let code = store.create(&handle()).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let code = code.clone();
                tokio::spawn(async move { store.redeem(&handle(), &code).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_clears_records_and_locks() {
        let storage = MemoryStorage::new();
        let store = CodeStore::with_policy(storage.clone(), expiring_policy());

        store.create(&handle()).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(storage.is_empty());
        assert!(store.locks.is_empty());
    }
}
