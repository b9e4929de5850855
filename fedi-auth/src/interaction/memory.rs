//! In-memory interaction coordinator with expiry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use tracing::debug;
use url::form_urlencoded;

use super::{ConsentGrant, InteractionCoordinator, InteractionDetails, Prompt};
use crate::error::{interaction_error, Error, InteractionErrorKind};

#[derive(Debug, Clone)]
struct Interaction {
    details: InteractionDetails,
    grant: Option<ConsentGrant>,
    expires_at: DateTime<Utc>,
}

/// Holds pending interactions in memory until they finish or expire.
///
/// Redirects point back at `{issuer}/auth/{uid}`, where the protocol engine
/// resumes the authorization request.
#[derive(Clone)]
pub struct MemoryCoordinator {
    interactions: Arc<DashMap<String, Interaction>>,
    issuer: String,
    ttl: Duration,
}

impl MemoryCoordinator {
    pub fn new(issuer: &str, ttl: Duration) -> Self {
        Self {
            interactions: Arc::new(DashMap::new()),
            issuer: issuer.trim_end_matches('/').to_string(),
            ttl,
        }
    }

    /// Drop interactions past their expiry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.interactions.len();
        self.interactions.retain(|_, interaction| interaction.expires_at > now);
        before.saturating_sub(self.interactions.len())
    }

    /// The consent recorded for a finished interaction, if any.
    pub fn granted(&self, uid: &str) -> Option<ConsentGrant> {
        self.interactions.get(uid).and_then(|i| i.grant.clone())
    }

    fn resume_url(&self, uid: &str) -> String {
        format!("{}/auth/{}", self.issuer, uid)
    }

    /// Run `update` on a live interaction, removing it instead if it expired.
    fn with_live<T>(
        &self,
        uid: &str,
        update: impl FnOnce(&mut Interaction) -> T,
    ) -> Result<T, Error> {
        let expired = || interaction_error(InteractionErrorKind::Expired, "Interaction expired");

        let mut entry = self.interactions.get_mut(uid).ok_or_else(expired)?;
        if entry.expires_at <= Utc::now() {
            drop(entry);
            self.interactions.remove(uid);
            debug!("Interaction {} expired", uid);
            return Err(expired());
        }

        Ok(update(entry.value_mut()))
    }

    fn generate_uid() -> String {
        let random_bytes: [u8; 16] = rand::thread_rng().gen();
        hex::encode(random_bytes)
    }
}

#[async_trait]
impl InteractionCoordinator for MemoryCoordinator {
    async fn begin(&self, client_id: &str, scopes: Vec<String>) -> Result<String, Error> {
        let uid = Self::generate_uid();
        let interaction = Interaction {
            details: InteractionDetails {
                uid: uid.clone(),
                prompt: Prompt::Login,
                client_id: client_id.to_string(),
                scopes,
                account_id: None,
            },
            grant: None,
            expires_at: Utc::now() + self.ttl,
        };
        self.interactions.insert(uid.clone(), interaction);

        debug!("Started interaction {} for client {}", uid, client_id);
        Ok(uid)
    }

    async fn details(&self, uid: &str) -> Result<InteractionDetails, Error> {
        self.with_live(uid, |interaction| interaction.details.clone())
    }

    async fn complete_login(&self, uid: &str, account_id: &str) -> Result<String, Error> {
        self.with_live(uid, |interaction| {
            interaction.details.account_id = Some(account_id.to_string());
            interaction.details.prompt = Prompt::Consent;
        })?;
        Ok(self.resume_url(uid))
    }

    async fn complete_consent(&self, uid: &str, grant: ConsentGrant) -> Result<String, Error> {
        self.with_live(uid, |interaction| {
            interaction.grant = Some(grant);
        })?;
        Ok(self.resume_url(uid))
    }

    async fn abort(&self, uid: &str) -> Result<String, Error> {
        self.with_live(uid, |_| ())?;
        self.interactions.remove(uid);

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("error", "access_denied")
            .append_pair("error_description", "End-User aborted interaction")
            .finish();
        Ok(format!("{}?{}", self.resume_url(uid), query))
    }
}
