//! Turns a remote account into a verified identity.
//!
//! Two paths lead to a `VerifiedIdentity`:
//! - direct: the user's own credentials (and TOTP token) are checked against
//!   their instance;
//! - out-of-band: a short code is sent by private message from the bridge's
//!   service account and later redeemed.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::identity::{IdentityHandle, VerifiedIdentity};
use crate::remote::{RemoteIdentity, RemoteSession};
use crate::verification::{CodeStorage, CodeStore};

/// Text of the private message carrying a code.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    /// Name of the service as shown to the recipient.
    pub service_name: String,
    /// Link appended to the message, usually the issuer's public URL.
    pub footer_url: Option<String>,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            service_name: "fedi-oidc".to_string(),
            footer_url: None,
        }
    }
}

impl MessageTemplate {
    pub fn render(&self, code: &str) -> String {
        let mut body = format!(
            "You or someone else is trying to identify you using {}\n\n\
             Code: {}\n\n\
             If you did not request this code; you can safely ignore it",
            self.service_name, code
        );
        if let Some(url) = &self.footer_url {
            body.push_str("\n\n");
            body.push_str(url);
        }
        body
    }
}

/// A sign-in attempt as submitted by the user. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub instance: String,
    pub username: String,
    pub password: Option<SecretString>,
    pub totp: Option<String>,
    /// A previously issued verification code.
    pub code: Option<String>,
}

impl LoginRequest {
    fn password(&self) -> Option<&SecretString> {
        self.password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
    }

    fn totp(&self) -> Option<&str> {
        self.totp.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Result of a verification step.
#[derive(Debug)]
pub enum VerificationOutcome {
    Verified(VerifiedIdentity),
    /// A code is on its way to `handle`; the user must submit it next.
    CodeSent { handle: IdentityHandle },
    Failed(Error),
}

impl From<Result<VerifiedIdentity, Error>> for VerificationOutcome {
    fn from(result: Result<VerifiedIdentity, Error>) -> Self {
        match result {
            Ok(identity) => VerificationOutcome::Verified(identity),
            Err(err) => VerificationOutcome::Failed(err),
        }
    }
}

pub struct VerificationBridge<R: RemoteIdentity + ?Sized, S: CodeStorage> {
    remote: Arc<R>,
    codes: CodeStore<S>,
    session: Arc<RemoteSession>,
    template: MessageTemplate,
}

impl<R: RemoteIdentity + ?Sized, S: CodeStorage> VerificationBridge<R, S> {
    pub fn new(remote: Arc<R>, codes: CodeStore<S>, session: Arc<RemoteSession>) -> Self {
        Self {
            remote,
            codes,
            session,
            template: MessageTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: MessageTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn codes(&self) -> &CodeStore<S> {
        &self.codes
    }

    /// Pick a path from what the user submitted: a code is redeemed, a
    /// password is checked directly, and anything else issues a new code.
    pub async fn verify(&self, request: &LoginRequest) -> VerificationOutcome {
        let handle = match IdentityHandle::new(&request.username, &request.instance) {
            Ok(handle) => handle,
            Err(err) => return VerificationOutcome::Failed(err),
        };

        if let Some(code) = request.code() {
            return self.redeem_code(&handle, code).await.into();
        }

        if let Some(password) = request.password() {
            return self
                .login_direct(&handle, password, request.totp())
                .await
                .into();
        }

        match self.issue_code(&handle).await {
            Ok(()) => VerificationOutcome::CodeSent { handle },
            Err(err) => VerificationOutcome::Failed(err),
        }
    }

    /// Verify with the user's own credentials on their instance.
    ///
    /// Second-factor failures come back as `MissingSecondFactor` or
    /// `InvalidSecondFactor` so the caller can prompt for a TOTP token.
    pub async fn login_direct(
        &self,
        handle: &IdentityHandle,
        password: &SecretString,
        totp: Option<&str>,
    ) -> Result<VerifiedIdentity, Error> {
        let session = self
            .remote
            .authenticate(handle.host(), handle.username(), password, totp)
            .await?;

        let profile = self
            .remote
            .fetch_profile(handle.host(), session.token())
            .await?;

        // The instance's spelling of the name is canonical.
        let verified = IdentityHandle::new(&profile.name, handle.host())?;
        info!("Verified {} by password", verified);

        Ok(VerifiedIdentity::new(verified, profile.display_name))
    }

    /// Send a fresh code to `handle` by private message.
    pub async fn issue_code(&self, handle: &IdentityHandle) -> Result<(), Error> {
        let capability = self
            .remote
            .check_federation_capability(handle.host())
            .await?;
        debug!(
            "{} runs {} {}",
            capability.host, capability.software.name, capability.software.version
        );

        let code = self.codes.create(handle).await?;

        if let Err(err) = self.deliver(handle, &code).await {
            warn!("Could not deliver code to {}: {}", handle, err);
            // Nothing reached the user, so let them ask again.
            self.codes.remove(handle).await?;
            return Err(err);
        }

        info!("Sent verification code to {}", handle);
        Ok(())
    }

    /// Redeem a code previously sent to `handle`. Codes are single-use; a
    /// mismatch leaves the pending code in place.
    pub async fn redeem_code(
        &self,
        handle: &IdentityHandle,
        submitted: &str,
    ) -> Result<VerifiedIdentity, Error> {
        self.codes.redeem(handle, submitted).await?;
        info!("Verified {} by code", handle);

        Ok(VerifiedIdentity::new(handle.clone(), None))
    }

    /// Periodic sweep of expired codes.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        self.codes.purge_expired().await
    }

    async fn deliver(&self, handle: &IdentityHandle, code: &str) -> Result<(), Error> {
        let recipient = self
            .remote
            .lookup_actor_id(self.session.host(), self.session.token(), &handle.key())
            .await?;

        self.remote
            .send_private_message(
                self.session.host(),
                self.session.token(),
                recipient,
                &self.template.render(code),
            )
            .await
    }
}
