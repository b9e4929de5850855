//! Timeout-bound HTTP client builder with retry middleware.

use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;

use super::BackoffPolicy;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout applied to every remote call.
    pub timeout: Duration,
    /// Maximum number of retries for transient failures. Zero disables retries.
    pub max_retries: u32,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 0,
            user_agent: format!("fedi-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client with middleware.
pub type HttpClient = reqwest_middleware::ClientWithMiddleware;

/// Builder for HTTP clients used to talk to remote instances.
///
/// Every client it produces has a request timeout so that a slow or silent
/// instance can never hold a caller-facing request open indefinitely.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .build()?;

        let retry_policy = BackoffPolicy::new(self.config.max_retries);
        let client_with_middleware = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(client_with_middleware)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
