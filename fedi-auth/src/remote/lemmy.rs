//! Lemmy implementation of the remote identity contract.
//!
//! Talks to the Lemmy v3 JSON API:
//! - `POST /api/v3/user/login`
//! - `GET  /api/v3/site`
//! - `GET  /api/v3/user`
//! - `POST /api/v3/private_message`
//!
//! plus nodeinfo discovery, which any fediverse server may implement.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::nodeinfo::{NodeInfo, WellKnown};
use super::{
    ActorId, CapabilityReport, InstanceDescription, InstanceMeta, Profile, RemoteIdentity,
    RemoteSession, REQUIRED_PROTOCOL,
};
use crate::error::{remote_error, Error, ErrorKind, RemoteErrorKind};
use crate::http::HttpClient;

const NOT_LEMMY_WARNING: &str =
    "Instance is not a Lemmy instance, you may not be able to receive the code (LemmyNet/lemmy#2657)";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    totp_2fa_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiteResponse {
    #[serde(default)]
    my_user: Option<MyUser>,
    #[serde(default)]
    site_view: Option<SiteView>,
}

#[derive(Debug, Deserialize)]
struct MyUser {
    local_user_view: LocalUserView,
}

#[derive(Debug, Deserialize)]
struct LocalUserView {
    person: Person,
}

#[derive(Debug, Deserialize)]
struct Person {
    id: i64,
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    banned: bool,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct SiteView {
    site: Site,
}

#[derive(Debug, Deserialize)]
struct Site {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonDetailsResponse {
    person_view: PersonView,
}

#[derive(Debug, Deserialize)]
struct PersonView {
    person: PersonId,
}

#[derive(Debug, Deserialize)]
struct PersonId {
    id: i64,
}

#[derive(Debug, Serialize)]
struct CreatePrivateMessage<'a> {
    auth: &'a str,
    content: &'a str,
    recipient_id: ActorId,
}

/// What came back from a Lemmy endpoint.
enum Reply<T> {
    Success(T),
    /// The instance answered but refused, with its `error` string.
    Rejected(String),
}

/// Lemmy API client.
pub struct Client {
    http: HttpClient,
    scheme: String,
}

impl Client {
    /// Create a new client speaking HTTPS.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            scheme: "https".to_string(),
        }
    }

    /// Override the URL scheme, e.g. `http` for a local instance.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    fn api_url(&self, host: &str, path: &str) -> String {
        format!("{}://{}/api/v3/{}", self.scheme, host, path)
    }

    async fn fetch_nodeinfo(&self, host: &str) -> Result<NodeInfo, Error> {
        let url = format!("{}://{}/.well-known/nodeinfo", self.scheme, host);

        let well_known: WellKnown = self.fetch_metadata(&url).await.map_err(|e| {
            debug!("No nodeinfo at {}: {}", url, e);
            remote_error(RemoteErrorKind::NoMetadata, "no_nodeinfo")
        })?;

        let href = well_known.schema_2_0().ok_or_else(|| {
            remote_error(
                RemoteErrorKind::ProtocolVersionUnsupported,
                "Nodeinfo 2.0 not found",
            )
        })?;

        self.fetch_metadata(href).await.map_err(|e| {
            debug!("Unreadable nodeinfo document at {}: {}", href, e);
            remote_error(RemoteErrorKind::NoMetadata, "Nodeinfo is invalid")
        })
    }

    async fn fetch_metadata<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_site(&self, host: &str, token: Option<&SecretString>) -> Result<Reply<SiteResponse>, Error> {
        let mut request = self.http.get(self.api_url(host, "site"));
        if let Some(token) = token {
            request = request
                .query(&[("auth", token.expose_secret().as_str())])
                .bearer_auth(token.expose_secret());
        }

        read_reply(request.send().await?).await
    }
}

#[async_trait]
impl RemoteIdentity for Client {
    async fn authenticate(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
        totp: Option<&str>,
    ) -> Result<RemoteSession, Error> {
        let body = LoginRequest {
            username_or_email: username,
            password: password.expose_secret(),
            totp_2fa_token: totp.map(str::trim).filter(|t| !t.is_empty()),
        };

        debug!("Logging into {} as {}", host, username);

        let response = self
            .http
            .post(self.api_url(host, "user/login"))
            .json(&body)
            .send()
            .await?;

        match read_reply::<LoginResponse>(response).await? {
            Reply::Success(LoginResponse { jwt: Some(jwt) }) => {
                Ok(RemoteSession::new(host, username, SecretString::new(jwt)))
            }
            // Registration pending approval or email unverified.
            Reply::Success(LoginResponse { jwt: None }) => Err(remote_error(
                RemoteErrorKind::InvalidCredentials,
                "Login returned no session token",
            )),
            Reply::Rejected(reason) => {
                let kind = classify_login_error(&reason);
                debug!("Login to {} rejected: {} ({:?})", host, reason, kind);
                Err(remote_error(kind, &reason))
            }
        }
    }

    async fn fetch_profile(&self, host: &str, token: &SecretString) -> Result<Profile, Error> {
        let site = match self.fetch_site(host, Some(token)).await? {
            Reply::Success(site) => site,
            Reply::Rejected(reason) => {
                return Err(remote_error(RemoteErrorKind::InvalidCredentials, &reason))
            }
        };

        let person = site
            .my_user
            .map(|user| user.local_user_view.person)
            .ok_or_else(|| {
                remote_error(
                    RemoteErrorKind::InvalidCredentials,
                    "Session is not logged in",
                )
            })?;

        if person.banned || person.deleted {
            warn!("Rejecting banned or deleted account {}@{}", person.name, host);
            return Err(remote_error(
                RemoteErrorKind::AccountBannedOrDeleted,
                "Account is banned or deleted",
            ));
        }

        Ok(Profile {
            id: ActorId(person.id),
            name: person.name,
            display_name: person.display_name,
            banned: person.banned,
            deleted: person.deleted,
        })
    }

    async fn lookup_actor_id(
        &self,
        host: &str,
        token: &SecretString,
        username: &str,
    ) -> Result<ActorId, Error> {
        let response = self
            .http
            .get(self.api_url(host, "user"))
            .query(&[
                ("auth", token.expose_secret().as_str()),
                ("username", username),
            ])
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        match read_reply::<PersonDetailsResponse>(response).await? {
            Reply::Success(details) => Ok(ActorId(details.person_view.person.id)),
            Reply::Rejected(reason) => {
                debug!("Actor lookup for {} rejected: {}", username, reason);
                Err(remote_error(RemoteErrorKind::ActorNotFound, "Can't find account"))
            }
        }
    }

    async fn send_private_message(
        &self,
        host: &str,
        token: &SecretString,
        recipient: ActorId,
        body: &str,
    ) -> Result<(), Error> {
        let request = CreatePrivateMessage {
            auth: token.expose_secret(),
            content: body,
            recipient_id: recipient,
        };

        let response = self
            .http
            .post(self.api_url(host, "private_message"))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await?;

        match read_reply::<serde_json::Value>(response).await? {
            Reply::Success(_) => Ok(()),
            Reply::Rejected(reason) => {
                warn!("Private message to actor {:?} rejected: {}", recipient, reason);
                Err(remote_error(
                    RemoteErrorKind::DeliveryRejected,
                    "Failed to send direct message",
                ))
            }
        }
    }

    async fn check_federation_capability(&self, host: &str) -> Result<CapabilityReport, Error> {
        let nodeinfo = self.fetch_nodeinfo(host).await?;

        if !nodeinfo.supports(REQUIRED_PROTOCOL) {
            return Err(remote_error(
                RemoteErrorKind::ProtocolUnsupported,
                "no_activitypub_support",
            ));
        }

        Ok(CapabilityReport {
            host: host.to_string(),
            software: nodeinfo.software,
            protocols: nodeinfo.protocols,
        })
    }

    async fn describe_instance(&self, host: &str) -> Result<InstanceDescription, Error> {
        let nodeinfo = self.fetch_nodeinfo(host).await?;
        let mut meta = InstanceMeta::default();
        let mut info = Vec::new();

        if nodeinfo.is_lemmy() {
            match self.fetch_site(host, None).await {
                Ok(Reply::Success(SiteResponse {
                    site_view: Some(view),
                    ..
                })) => {
                    meta.name = view.site.name.unwrap_or_default();
                    meta.icon = view.site.icon.unwrap_or_default();
                }
                Ok(_) => {}
                Err(err) => warn!("Could not fetch site metadata for {}: {}", host, err),
            }
        } else {
            info.push(NOT_LEMMY_WARNING.to_string());
        }

        Ok(InstanceDescription {
            software: nodeinfo.software,
            meta,
            info,
        })
    }
}

/// Read a Lemmy response: `{"error": "..."}` bodies and other client errors
/// become `Rejected`; server errors, rate limiting and undecodable success
/// bodies are `Unavailable`.
async fn read_reply<T: DeserializeOwned>(response: Response) -> Result<Reply<T>, Error> {
    let status = response.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(remote_error(
            RemoteErrorKind::Unavailable,
            &format!("Remote returned {}", status),
        ));
    }

    let bytes = response.bytes().await?;
    let body: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        // Proxy error pages, e.g. an HTML 404, carry no Lemmy error string.
        Err(_) if !status.is_success() => return Ok(Reply::Rejected(status.to_string())),
        Err(err) => {
            return Err(Error {
                source: Some(Box::new(err)),
                error_kind: ErrorKind::Remote(RemoteErrorKind::Unavailable),
            })
        }
    };

    if let Some(reason) = body.get("error").and_then(|e| e.as_str()) {
        return Ok(Reply::Rejected(reason.to_string()));
    }
    if !status.is_success() {
        return Ok(Reply::Rejected(status.to_string()));
    }

    serde_json::from_value(body)
        .map(Reply::Success)
        .map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Remote(RemoteErrorKind::Unavailable),
        })
}

/// Map a login error string onto the fixed error kinds.
///
/// Lemmy has reported second-factor failures as `missing_totp_token`,
/// `incorrect_totp token` and `incorrect_totp_token` across versions, so the
/// string is canonicalized before matching.
pub fn classify_login_error(reason: &str) -> RemoteErrorKind {
    let canonical: String = reason
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if canonical.contains("totp") || canonical.contains("2fa") {
        if canonical.contains("missing") || canonical.contains("required") {
            RemoteErrorKind::MissingSecondFactor
        } else {
            RemoteErrorKind::InvalidSecondFactor
        }
    } else if canonical.contains("ban") || canonical.contains("deleted") {
        RemoteErrorKind::AccountBannedOrDeleted
    } else {
        RemoteErrorKind::InvalidCredentials
    }
}
