//! Messenger configuration and registry construction.

use std::sync::Arc;
use std::time::Duration;

use orchestra_core::config::{env_list, env_opt, env_or, env_parse, ConfigError};

use crate::delivery::DEFAULT_MAX_IN_FLIGHT;
use crate::error::MessengerError;
use crate::{MemoryMessenger, MessengerRegistry, NatsMessenger, PubSubMessenger};

#[derive(Debug, Clone, PartialEq)]
pub struct NatsConfig {
    pub url: String,
    pub stream: String,
    pub subjects: Vec<String>,
    pub ack_wait: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PubSubConfig {
    pub project_id: String,
    pub endpoint: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

/// Which transports to build and how.
#[derive(Debug, Clone, PartialEq)]
pub struct MessengerConfig {
    /// Registry names of the bindings to build.
    pub enabled: Vec<String>,
    /// Concurrent handlers per subscription.
    pub max_in_flight: usize,
    pub nats: NatsConfig,
    /// Present when `GCP_PROJECT_ID` is set.
    pub pubsub: Option<PubSubConfig>,
}

impl MessengerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                          |
    /// |------------------------|----------------------------------|
    /// | `MESSENGERS`           | `nats`                           |
    /// | `MAX_IN_FLIGHT`        | `8`                              |
    /// | `NATS_URL`             | `nats://localhost:4222`          |
    /// | `NATS_STREAM`          | `ORCHESTRA`                      |
    /// | `NATS_SUBJECTS`        | `orchestra.>`                    |
    /// | `NATS_ACK_WAIT_SECS`   | `30`                             |
    /// | `GCP_PROJECT_ID`       | unset (Pub/Sub disabled)         |
    /// | `PUBSUB_ENDPOINT`      | `https://pubsub.googleapis.com`  |
    /// | `PUBSUB_EMULATOR_HOST` | unset                            |
    /// | `GCP_ACCESS_TOKEN`     | unset                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        let nats = NatsConfig {
            url: env_or("NATS_URL", "nats://localhost:4222"),
            stream: env_or("NATS_STREAM", "ORCHESTRA"),
            subjects: env_list("NATS_SUBJECTS", "orchestra.>"),
            ack_wait: Duration::from_secs(env_parse("NATS_ACK_WAIT_SECS", 30u64)?),
        };

        let pubsub = env_opt("GCP_PROJECT_ID").map(|project_id| PubSubConfig {
            project_id,
            endpoint: env_or("PUBSUB_ENDPOINT", "https://pubsub.googleapis.com"),
            emulator_host: env_opt("PUBSUB_EMULATOR_HOST"),
            access_token: env_opt("GCP_ACCESS_TOKEN"),
            request_timeout: Duration::from_secs(90),
        });

        Ok(Self {
            enabled: env_list("MESSENGERS", NatsMessenger::NAME)
                .into_iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            max_in_flight: env_parse("MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT)?,
            nats,
            pubsub,
        })
    }

    /// Configuration with only the in-process transport enabled.
    pub fn memory_only() -> Self {
        Self {
            enabled: vec![MemoryMessenger::NAME.to_string()],
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                stream: "ORCHESTRA".to_string(),
                subjects: vec!["orchestra.>".to_string()],
                ack_wait: Duration::from_secs(30),
            },
            pubsub: None,
        }
    }
}

/// Connect every enabled transport and register it under its name.
pub async fn build_registry(config: &MessengerConfig) -> Result<MessengerRegistry, MessengerError> {
    let mut registry = MessengerRegistry::new();
    for name in &config.enabled {
        match name.as_str() {
            NatsMessenger::NAME => {
                let nats = NatsMessenger::connect(&config.nats, config.max_in_flight).await?;
                registry.register(name, Arc::new(nats));
            }
            PubSubMessenger::NAME => {
                let pubsub_config = config.pubsub.as_ref().ok_or_else(|| {
                    MessengerError::Config("pubsub enabled but GCP_PROJECT_ID is not set".to_string())
                })?;
                let pubsub = PubSubMessenger::new(pubsub_config, config.max_in_flight)?;
                registry.register(name, Arc::new(pubsub));
            }
            MemoryMessenger::NAME => {
                registry.register(
                    name,
                    Arc::new(MemoryMessenger::with_max_in_flight(config.max_in_flight)),
                );
            }
            other => {
                return Err(MessengerError::Config(format!("unknown messenger {other:?}")));
            }
        }
    }
    tracing::info!(messengers = ?registry.names(), "Messenger registry built");
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
