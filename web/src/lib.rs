use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use fedi_auth::bridge::VerificationBridge;
use fedi_auth::interaction::{AccountResolver, InteractionCoordinator};
use fedi_auth::remote::RemoteIdentity;
use fedi_auth::verification::MemoryStorage;
use log::*;
use service::config::Config;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod params;
mod response;
mod router;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use router::define_routes;

/// The bridge as served over HTTP: any remote client, codes kept in memory.
pub type Bridge = VerificationBridge<dyn RemoteIdentity, MemoryStorage>;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub bridge: Arc<Bridge>,
    pub interactions: Arc<dyn InteractionCoordinator>,
    pub accounts: Arc<dyn AccountResolver>,
}

impl AppState {
    pub fn new(
        config: Config,
        bridge: Arc<Bridge>,
        interactions: Arc<dyn InteractionCoordinator>,
        accounts: Arc<dyn AccountResolver>,
    ) -> Self {
        Self {
            config,
            bridge,
            interactions,
            accounts,
        }
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{}:{}", host, app_state.config.port);
    let listener = TcpListener::bind(&server_url).await?;

    info!("Server starting... listening for connections on http://{server_url}");

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .allow_origin(allowed_origins(&app_state.config))
        .max_age(Duration::from_secs(60 * 60 * 24));

    axum::serve(listener, define_routes(app_state).layer(cors_layer)).await
}

fn allowed_origins(config: &Config) -> Vec<HeaderValue> {
    config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect()
}
