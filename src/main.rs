use std::error::Error as StdError;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use fedi_auth::bridge::{MessageTemplate, VerificationBridge};
use fedi_auth::http::HttpClientBuilder;
use fedi_auth::identity::normalize_host;
use fedi_auth::interaction::{HandleResolver, MemoryCoordinator};
use fedi_auth::remote::{lemmy, RemoteIdentity, RemoteSession};
use fedi_auth::verification::{CodePolicy, CodeStore, MemoryStorage};
use log::*;
use secrecy::SecretString;
use service::{config::Config, logging::Logger};
use web::{AppState, Bridge};

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(err) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {err}");
        process::exit(1);
    }

    info!(
        "Starting up fedi-oidc in {} mode, issuer {}",
        config.runtime_env(),
        config.issuer()
    );

    let purge_interval = config.purge_interval();
    let interactions = MemoryCoordinator::new(
        config.issuer(),
        chrono::Duration::seconds(config.interaction_ttl_secs),
    );

    let bridge = match build_bridge(&config).await {
        Ok(bridge) => Arc::new(bridge),
        Err(err) => {
            error!("Could not start the verification bridge: {err}");
            process::exit(1);
        }
    };

    spawn_purge_task(Arc::clone(&bridge), interactions.clone(), purge_interval);

    let app_state = AppState::new(
        config,
        bridge,
        Arc::new(interactions),
        Arc::new(HandleResolver),
    );

    if let Err(err) = web::init_server(app_state).await {
        error!("Server stopped: {err}");
        process::exit(1);
    }
}

/// Log the service account in and assemble the bridge around it.
async fn build_bridge(config: &Config) -> Result<Bridge, Box<dyn StdError + Send + Sync>> {
    let (Some(instance), Some(username), Some(password)) = (
        config.bridge_instance(),
        config.bridge_username(),
        config.bridge_password(),
    ) else {
        return Err("BRIDGE_INSTANCE, BRIDGE_USERNAME and BRIDGE_PASSWORD must all be set".into());
    };
    let host = normalize_host(instance).ok_or("BRIDGE_INSTANCE is not a valid host")?;

    let http = HttpClientBuilder::new()
        .with_timeout(config.remote_timeout())
        .with_max_retries(config.remote_max_retries)
        .build()?;
    let remote: Arc<dyn RemoteIdentity> =
        Arc::new(lemmy::Client::new(http).with_scheme(config.remote_scheme()));

    let password = SecretString::new(password.to_string());
    let session = RemoteSession::acquire(remote.as_ref(), &host, username, &password).await?;
    info!(
        "Verification codes will be sent by {}@{}",
        session.username(),
        session.host()
    );

    let policy = CodePolicy {
        ttl: chrono::Duration::seconds(config.code_ttl_secs),
        min_reissue_interval: chrono::Duration::seconds(config.code_min_reissue_secs),
    };
    let template = MessageTemplate {
        service_name: config.service_name().to_string(),
        footer_url: Some(config.message_footer_url().to_string()),
    };

    Ok(VerificationBridge::new(
        remote,
        CodeStore::with_policy(MemoryStorage::new(), policy),
        Arc::new(session),
    )
    .with_template(template))
}

/// Periodically drop expired codes and interactions. A zero interval disables the sweep.
fn spawn_purge_task(bridge: Arc<Bridge>, interactions: MemoryCoordinator, every: Duration) {
    if every.is_zero() {
        warn!("Purge interval is zero, expired codes are only removed on access");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match bridge.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {purged} expired verification codes"),
                Err(err) => warn!("Failed to purge verification codes: {err}"),
            }

            let purged = interactions.purge_expired();
            if purged > 0 {
                debug!("Purged {purged} expired interactions");
            }
        }
    });
}
