//! Shared fixtures for router and controller tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Parser;
use fedi_auth::bridge::{MessageTemplate, VerificationBridge};
use fedi_auth::error::{remote_error, Error as AuthError, RemoteErrorKind};
use fedi_auth::http::HttpClientBuilder;
use fedi_auth::interaction::{HandleResolver, MemoryCoordinator};
use fedi_auth::remote::{
    lemmy, ActorId, CapabilityReport, InstanceDescription, Profile, RemoteIdentity,
    RemoteSession, Software,
};
use fedi_auth::verification::{CodeStore, MemoryStorage};
use secrecy::{ExposeSecret, SecretString};
use service::config::Config;

use crate::AppState;

/// Remote that accepts `hunter2` for everyone, wants a TOTP token from
/// `carol`, and keeps the last private message it was asked to send.
#[derive(Default)]
pub(crate) struct StubRemote {
    last_message: Mutex<Option<String>>,
}

impl StubRemote {
    pub(crate) fn last_code(&self) -> Option<String> {
        let message = self.last_message.lock().unwrap();
        message
            .as_deref()?
            .lines()
            .find_map(|line| line.strip_prefix("Code: "))
            .map(str::to_string)
    }
}

#[async_trait]
impl RemoteIdentity for StubRemote {
    async fn authenticate(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
        totp: Option<&str>,
    ) -> Result<RemoteSession, AuthError> {
        if password.expose_secret() != "hunter2" {
            return Err(remote_error(RemoteErrorKind::InvalidCredentials, "incorrect_login"));
        }
        if username == "carol" && totp != Some("123456") {
            let kind = match totp {
                None => RemoteErrorKind::MissingSecondFactor,
                Some(_) => RemoteErrorKind::InvalidSecondFactor,
            };
            return Err(remote_error(kind, "totp"));
        }
        Ok(RemoteSession::new(
            host,
            username,
            SecretString::new(username.to_string()),
        ))
    }

    async fn fetch_profile(&self, _host: &str, token: &SecretString) -> Result<Profile, AuthError> {
        Ok(Profile {
            id: ActorId(1),
            name: token.expose_secret().clone(),
            display_name: None,
            banned: false,
            deleted: false,
        })
    }

    async fn lookup_actor_id(
        &self,
        _host: &str,
        _token: &SecretString,
        _username: &str,
    ) -> Result<ActorId, AuthError> {
        Ok(ActorId(7))
    }

    async fn send_private_message(
        &self,
        _host: &str,
        _token: &SecretString,
        _recipient: ActorId,
        body: &str,
    ) -> Result<(), AuthError> {
        *self.last_message.lock().unwrap() = Some(body.to_string());
        Ok(())
    }

    async fn check_federation_capability(
        &self,
        host: &str,
    ) -> Result<CapabilityReport, AuthError> {
        Ok(CapabilityReport {
            host: host.to_string(),
            software: Software {
                name: "lemmy".to_string(),
                version: "0.19.3".to_string(),
            },
            protocols: vec!["activitypub".to_string()],
        })
    }

    async fn describe_instance(&self, _host: &str) -> Result<InstanceDescription, AuthError> {
        Err(remote_error(RemoteErrorKind::NoMetadata, "no_nodeinfo"))
    }
}

/// Lemmy client speaking plain http, for use against a mockito server.
pub(crate) fn lemmy_client() -> Arc<dyn RemoteIdentity> {
    let http = HttpClientBuilder::new().build().unwrap();
    Arc::new(lemmy::Client::new(http).with_scheme("http"))
}

pub(crate) fn app_state(remote: Arc<dyn RemoteIdentity>) -> AppState {
    let config = Config::try_parse_from(["fedi_oidc", "--issuer", "https://id.example"]).unwrap();
    let session = RemoteSession::new(
        "home.example",
        "bridge",
        SecretString::new("service-jwt".to_string()),
    );
    let bridge = VerificationBridge::new(
        remote,
        CodeStore::new(MemoryStorage::new()),
        Arc::new(session),
    )
    .with_template(MessageTemplate {
        service_name: "fedi-oidc".to_string(),
        footer_url: Some(config.message_footer_url().to_string()),
    });

    AppState::new(
        config,
        Arc::new(bridge),
        Arc::new(MemoryCoordinator::new(
            "https://id.example",
            chrono::Duration::minutes(10),
        )),
        Arc::new(HandleResolver),
    )
}
