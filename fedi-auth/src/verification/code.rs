//! Verification code values and their persisted form.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{storage_error, Error};
use crate::identity::IdentityHandle;

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 5;

const CODE_SPACE: u32 = 100_000;

/// A pending verification code for one identity handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode {
    pub handle: IdentityHandle,
    /// Always `CODE_LENGTH` digits; leading zeros are significant.
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Compare a submitted code. Both sides stay strings so `00042` never
    /// matches `42`.
    pub fn matches(&self, submitted: &str) -> bool {
        self.code == submitted.trim()
    }

    pub(crate) fn from_stored(handle: IdentityHandle, stored: StoredCode) -> Result<Self, Error> {
        let issued_at = DateTime::from_timestamp_millis(stored.issued_at)
            .ok_or_else(|| storage_error("Stored code has an invalid issue timestamp"))?;
        let expires_at = DateTime::from_timestamp_millis(stored.expires_at)
            .ok_or_else(|| storage_error("Stored code has an invalid expiry timestamp"))?;

        Ok(Self {
            handle,
            code: stored.code,
            issued_at,
            expires_at,
        })
    }
}

/// Persisted record, keyed by `username@host`. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCode {
    pub code: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl StoredCode {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }

    /// True once the record is neither redeemable nor needed to enforce the
    /// re-issue interval, so it can be dropped.
    pub fn is_stale_at(&self, now_millis: i64, min_reissue_millis: i64) -> bool {
        self.is_expired_at(now_millis) && now_millis >= self.issued_at + min_reissue_millis
    }
}

/// Draw a code uniformly from `00000`..=`99999`.
pub fn generate_code() -> String {
    let value = rand::thread_rng().gen_range(0..CODE_SPACE);
    format!("{:0width$}", value, width = CODE_LENGTH)
}
