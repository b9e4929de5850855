//! Remote identity provider access.
//!
//! The `RemoteIdentity` trait is the fixed contract the bridge relies on;
//! `lemmy::Client` implements it against the Lemmy v3 HTTP API and nodeinfo
//! discovery.

mod nodeinfo;
mod session;

pub mod lemmy;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use nodeinfo::{NODEINFO_SCHEMA_2_0, REQUIRED_PROTOCOL};
pub use session::RemoteSession;

/// Numeric actor id assigned by the remote instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

/// Canonical profile of an authenticated remote account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: ActorId,
    /// Local username on the instance.
    pub name: String,
    pub display_name: Option<String>,
    pub banned: bool,
    pub deleted: bool,
}

/// Server software as declared by nodeinfo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Evidence that a host speaks the federation protocol the bridge needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub host: String,
    pub software: Software,
    pub protocols: Vec<String>,
}

/// Display metadata of an instance, as shown on the sign-in page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceMeta {
    pub name: String,
    pub icon: String,
}

/// Result of describing an instance before a user signs in through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceDescription {
    pub software: Software,
    pub meta: InstanceMeta,
    /// Human-readable warnings, e.g. when private messages may not arrive.
    pub info: Vec<String>,
}

/// Contract with the remote identity provider.
///
/// All methods perform outbound network calls only and are bound by the
/// client's request timeout.
#[async_trait]
pub trait RemoteIdentity: Send + Sync {
    /// Exchange credentials, and an optional TOTP token, for a session.
    ///
    /// The remote's second-factor error strings are normalized into
    /// `MissingSecondFactor` and `InvalidSecondFactor`.
    async fn authenticate(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
        totp: Option<&str>,
    ) -> Result<RemoteSession, Error>;

    /// Fetch the profile behind a session token, rejecting banned or deleted
    /// accounts.
    async fn fetch_profile(&self, host: &str, token: &SecretString) -> Result<Profile, Error>;

    /// Resolve a user, local or `user@host`, to the actor id known on `host`.
    async fn lookup_actor_id(
        &self,
        host: &str,
        token: &SecretString,
        username: &str,
    ) -> Result<ActorId, Error>;

    /// Send a private message from the session's account to `recipient`.
    async fn send_private_message(
        &self,
        host: &str,
        token: &SecretString,
        recipient: ActorId,
        body: &str,
    ) -> Result<(), Error>;

    /// Verify that `host` publishes nodeinfo 2.0 declaring ActivityPub.
    async fn check_federation_capability(&self, host: &str) -> Result<CapabilityReport, Error>;

    /// Describe the software and branding of `host`.
    async fn describe_instance(&self, host: &str) -> Result<InstanceDescription, Error>;
}
