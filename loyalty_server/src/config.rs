use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use loyalty_common::{helpers::parse_boolean_flag, Secret};
use loyalty_engine::DispatcherConfig;
use rand::{thread_rng, RngCore};

const DEFAULT_LPS_HOST: &str = "127.0.0.1";
const DEFAULT_LPS_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_ACCRUAL_URL: &str = "http://127.0.0.1:8081";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Secret<String>,
    /// The size of the connection pool shared by the request handlers and the reconciliation workers.
    pub database_max_connections: u32,
    /// Base URL of the accrual authority, e.g. `http://accrual:8081`.
    pub accrual_url: String,
    pub dispatcher: DispatcherConfig,
    /// If true, orders that are still `NEW` or `PROCESSING` are queued for reconciliation at startup.
    pub resume_unsettled: bool,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPS_HOST.to_string(),
            port: DEFAULT_LPS_PORT,
            database_url: Secret::default(),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            accrual_url: DEFAULT_ACCRUAL_URL.to_string(),
            dispatcher: DispatcherConfig::default(),
            resume_unsettled: true,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    /// The HTTP client timeout for the accrual authority. Twice the per-call deadline, so the workers' own deadline
    /// always fires first.
    pub fn accrual_client_timeout(&self) -> Duration {
        self.dispatcher.accrual_timeout.saturating_mul(2)
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LPS_HOST").ok().unwrap_or_else(|| DEFAULT_LPS_HOST.into());
        let port = parse_env("LPS_PORT", DEFAULT_LPS_PORT);
        let database_url = env::var("LPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ LPS_DATABASE_URL is not set. Please set it to the URL for the loyalty database.");
            String::default()
        });
        let database_max_connections = parse_env("LPS_DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let accrual_url = env::var("LPS_ACCRUAL_URL").ok().unwrap_or_else(|| {
            info!("🪛️ LPS_ACCRUAL_URL is not set. Using the default, {DEFAULT_ACCRUAL_URL}.");
            DEFAULT_ACCRUAL_URL.into()
        });
        let dispatcher = configure_dispatcher();
        let resume_unsettled = parse_boolean_flag(env::var("LPS_RESUME_UNSETTLED").ok(), true);
        let auth = AuthConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url: Secret::new(database_url),
            database_max_connections,
            accrual_url,
            dispatcher,
            resume_unsettled,
            auth,
        }
    }
}

fn configure_dispatcher() -> DispatcherConfig {
    let defaults = DispatcherConfig::default();
    let workers = parse_env("LPS_RECONCILE_WORKERS", defaults.workers);
    let workers = if workers == 0 {
        warn!("🪛️ LPS_RECONCILE_WORKERS must be at least 1. Using 1 worker.");
        1
    } else {
        workers
    };
    let accrual_timeout = parse_env("LPS_ACCRUAL_TIMEOUT", defaults.accrual_timeout.as_secs());
    let max_polls = parse_env("LPS_ACCRUAL_MAX_POLLS", defaults.max_polls).max(1);
    let poll_interval = parse_env("LPS_ACCRUAL_POLL_INTERVAL", defaults.poll_interval.as_secs());
    DispatcherConfig {
        workers,
        accrual_timeout: Duration::from_secs(accrual_timeout),
        max_polls,
        poll_interval: Duration::from_secs(poll_interval),
    }
}

fn token_lifetime_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

/// Reads `name` from the environment, falling back to `default` (with a log message) if it is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC key used to sign and verify session tokens.
    pub jwt_secret: Secret<String>,
    /// How long a session token stays valid after login.
    pub token_lifetime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. All sessions will be \
             invalidated when the server restarts. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let mut key = [0u8; 32];
        thread_rng().fill_bytes(&mut key);
        let secret = key.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self { jwt_secret: Secret::new(secret), token_lifetime: DEFAULT_TOKEN_LIFETIME }
    }
}

impl AuthConfig {
    pub fn new(secret: &str, token_lifetime: Duration) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()), token_lifetime }
    }

    pub fn from_env_or_default() -> Self {
        let hours = parse_env("LPS_TOKEN_LIFETIME", DEFAULT_TOKEN_LIFETIME.as_secs() / 3600);
        let token_lifetime = token_lifetime_from_hours(hours);
        match env::var("LPS_JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => Self::new(s.trim(), token_lifetime),
            _ => Self { token_lifetime, ..Self::default() },
        }
    }
}
