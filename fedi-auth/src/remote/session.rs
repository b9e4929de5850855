//! The bridge's own session on its home instance.

use secrecy::SecretString;
use tracing::info;

use super::RemoteIdentity;
use crate::error::Error;

/// An authenticated session on a remote instance.
///
/// The bridge acquires one for its service account at startup and uses it to
/// look up actors and send private messages. It is never refreshed or
/// mutated afterwards; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    host: String,
    username: String,
    token: SecretString,
}

impl RemoteSession {
    pub fn new(host: &str, username: &str, token: SecretString) -> Self {
        Self {
            host: host.to_string(),
            username: username.to_string(),
            token,
        }
    }

    /// Log the service account in. A failure here is fatal to startup.
    pub async fn acquire<R: RemoteIdentity + ?Sized>(
        remote: &R,
        host: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<Self, Error> {
        info!(host, username, "Logging into service account");
        let session = remote.authenticate(host, username, password, None).await?;
        info!(host, username, "Logged into service account");
        Ok(session)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}
