//! Identity handles and verified identities.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{input_error, Error, InputErrorKind};

/// A federated account: a local username on a specific instance.
///
/// The string form `username@host` is the key used by the code store and by
/// account resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityHandle {
    username: String,
    host: String,
}

impl IdentityHandle {
    /// Build a handle from caller input. Host and username are lower-cased;
    /// instances resolve user names case-insensitively.
    pub fn new(username: &str, host: &str) -> Result<Self, Error> {
        let host = normalize_host(host)
            .ok_or_else(|| input_error(InputErrorKind::MissingInstance, "Missing instance"))?;

        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Err(input_error(
                InputErrorKind::MissingUsername,
                "Missing username",
            ));
        }
        if username.contains('@') || username.contains('/') {
            return Err(input_error(
                InputErrorKind::InvalidUsername,
                "Invalid username",
            ));
        }

        Ok(Self {
            username: username.to_lowercase(),
            host,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The `username@host` key form.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IdentityHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.host)
    }
}

impl Serialize for IdentityHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reduce user-supplied instance input to a bare, lower-cased host.
///
/// Accepts `example.social`, `https://example.social/` and
/// `HTTP://Example.Social/some/path` alike. Returns `None` when nothing
/// usable remains.
pub fn normalize_host(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(lowered.as_str());

    let host = without_scheme.split('/').next().unwrap_or_default().trim();
    if host.is_empty() || host.contains(char::is_whitespace) || host.contains('@') {
        return None;
    }

    Some(host.to_string())
}

/// The bridge's output: a remote account whose control has been proven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub handle: IdentityHandle,
    pub display_name: Option<String>,
    pub verified: bool,
}

impl VerifiedIdentity {
    pub fn new(handle: IdentityHandle, display_name: Option<String>) -> Self {
        Self {
            handle,
            display_name,
            verified: true,
        }
    }
}
