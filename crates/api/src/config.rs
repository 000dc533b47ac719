use orchestra_core::config::{env_list, env_or, env_parse, env_required, ConfigError};
use orchestra_messenger::MessengerConfig;
use orchestra_scheduler::RandomScheduler;

/// Server configuration loaded from environment variables.
///
/// All fields except `database_url` have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the status subscription to drain.
    pub shutdown_timeout_secs: u64,
    /// Registry name of the cluster selection policy (default: `random`).
    pub scheduler: String,
    /// Messenger the status reconciler subscribes through.
    pub status_messenger: String,
    /// Subscription carrying `status_update` messages.
    pub status_subscription: String,
    pub messenger: MessengerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `DATABASE_URL`          | required                |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `SCHEDULER`             | `random`                |
    /// | `STATUS_MESSENGER`      | `nats`                  |
    /// | `STATUS_SUBSCRIPTION`   | `orchestra.status`      |
    ///
    /// Messenger variables are documented on [`MessengerConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000u16)?,
            database_url: env_required("DATABASE_URL")?,
            cors_origins: env_list("CORS_ORIGINS", "http://localhost:5173"),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30u64)?,
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30u64)?,
            scheduler: env_or("SCHEDULER", RandomScheduler::NAME),
            status_messenger: env_or("STATUS_MESSENGER", "nats").to_ascii_lowercase(),
            status_subscription: env_or("STATUS_SUBSCRIPTION", "orchestra.status"),
            messenger: MessengerConfig::from_env()?,
        })
    }
}
