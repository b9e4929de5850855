use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Public URL of this identity provider. Interaction redirects point back here.
    #[arg(long, env, default_value = "http://localhost:4000")]
    issuer: String,

    /// Home instance of the account that sends verification codes
    #[arg(long, env)]
    bridge_instance: Option<String>,

    /// Username of the account that sends verification codes
    #[arg(long, env)]
    bridge_username: Option<String>,

    /// Password of the account that sends verification codes
    #[arg(long, env, hide_env_values = true)]
    bridge_password: Option<String>,

    /// URL scheme used to reach remote instances. Only use http for local testing.
    #[arg(
        long,
        env,
        default_value = "https",
        value_parser = clap::builder::PossibleValuesParser::new(["http", "https"])
    )]
    remote_scheme: String,

    /// Timeout in seconds for every request to a remote instance
    #[arg(long, env, default_value_t = 10)]
    pub remote_timeout_secs: u64,

    /// Retries for transient failures when calling remote instances
    #[arg(long, env, default_value_t = 0)]
    pub remote_max_retries: u32,

    /// Seconds a verification code stays redeemable
    #[arg(long, env, default_value_t = 3600)]
    pub code_ttl_secs: i64,

    /// Minimum seconds between two codes issued to the same account
    #[arg(long, env, default_value_t = 600)]
    pub code_min_reissue_secs: i64,

    /// Seconds between sweeps of expired codes and interactions
    #[arg(long, env, default_value_t = 300)]
    pub purge_interval_secs: u64,

    /// Seconds a login interaction stays open
    #[arg(long, env, default_value_t = 3600)]
    pub interaction_ttl_secs: i64,

    /// Service name shown in verification messages
    #[arg(long, env, default_value = "fedi-oidc")]
    service_name: String,

    /// Link appended to verification messages. Defaults to the issuer URL.
    #[arg(long, env)]
    message_footer_url: Option<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn issuer(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    pub fn bridge_instance(&self) -> Option<&str> {
        self.bridge_instance.as_deref()
    }

    pub fn bridge_username(&self) -> Option<&str> {
        self.bridge_username.as_deref()
    }

    pub fn bridge_password(&self) -> Option<&str> {
        self.bridge_password.as_deref()
    }

    pub fn remote_scheme(&self) -> &str {
        &self.remote_scheme
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the footer link for verification messages, falling back to the issuer.
    pub fn message_footer_url(&self) -> &str {
        self.message_footer_url
            .as_deref()
            .unwrap_or_else(|| self.issuer())
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
