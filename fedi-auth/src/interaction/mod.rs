//! Boundary to the authorization protocol engine.
//!
//! The bridge only produces a `VerifiedIdentity`. Turning it into a finished
//! login, and later into consent, is the job of an `InteractionCoordinator`.
//! `MemoryCoordinator` is a self-contained implementation; a full OpenID
//! Connect engine can sit behind the same trait.

mod memory;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::identity::VerifiedIdentity;

pub use memory::MemoryCoordinator;

/// What the pending interaction is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Prompt {
    Login,
    Consent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionDetails {
    pub uid: String,
    pub prompt: Prompt,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Set once the login step has completed.
    pub account_id: Option<String>,
}

/// Scopes and claims the user agreed to on the consent page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentGrant {
    pub scopes: Vec<String>,
    pub claims: Vec<String>,
}

/// A pending authorization interaction, identified by an opaque `uid`.
///
/// Every method fails with `InteractionExpired` when `uid` is unknown or has
/// timed out. Successful calls return the URL the user agent is sent to next.
#[async_trait]
pub trait InteractionCoordinator: Send + Sync {
    /// Open a login interaction for `client_id` and return its uid.
    async fn begin(&self, client_id: &str, scopes: Vec<String>) -> Result<String, Error>;

    async fn details(&self, uid: &str) -> Result<InteractionDetails, Error>;

    async fn complete_login(&self, uid: &str, account_id: &str) -> Result<String, Error>;

    async fn complete_consent(&self, uid: &str, grant: ConsentGrant) -> Result<String, Error>;

    /// End the interaction with `access_denied`.
    async fn abort(&self, uid: &str) -> Result<String, Error>;
}

/// Maps a verified identity onto a local account id.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, identity: &VerifiedIdentity) -> Result<String, Error>;
}

/// Uses the `username@host` form as the account id.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleResolver;

#[async_trait]
impl AccountResolver for HandleResolver {
    async fn resolve(&self, identity: &VerifiedIdentity) -> Result<String, Error> {
        Ok(identity.handle.key())
    }
}

/// Hand a verified identity to the coordinator and return the redirect.
pub async fn finish_login<C, A>(
    coordinator: &C,
    resolver: &A,
    uid: &str,
    identity: &VerifiedIdentity,
) -> Result<String, Error>
where
    C: InteractionCoordinator + ?Sized,
    A: AccountResolver + ?Sized,
{
    let account_id = resolver.resolve(identity).await?;
    debug!("Completing login for interaction {} as {}", uid, account_id);
    coordinator.complete_login(uid, &account_id).await
}
