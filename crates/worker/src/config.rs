use orchestra_cluster::{SlurmCluster, SlurmConfig};
use orchestra_core::config::{env_or, ConfigError};
use orchestra_messenger::{MessengerConfig, NatsMessenger};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Registry name of the cluster backend (default: `slurm`).
    pub cluster_backend: String,
    pub dispatch_messenger: String,
    /// Subscription carrying `dispatch_schedule` messages for this cluster.
    pub dispatch_subscription: String,
    pub status_messenger: String,
    /// Topic `status_update` messages are published on.
    pub status_topic: String,
    pub messenger: MessengerConfig,
    pub slurm: SlurmConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `CLUSTER_BACKEND`       | `slurm`                 |
    /// | `DISPATCH_MESSENGER`    | `nats`                  |
    /// | `DISPATCH_SUBSCRIPTION` | `orchestra.dispatch`    |
    /// | `STATUS_MESSENGER`      | `nats`                  |
    /// | `STATUS_TOPIC`          | `orchestra.status`      |
    ///
    /// Messenger and Slurm variables are documented on
    /// [`MessengerConfig::from_env`] and [`SlurmConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cluster_backend: env_or("CLUSTER_BACKEND", SlurmCluster::NAME).to_ascii_lowercase(),
            dispatch_messenger: env_or("DISPATCH_MESSENGER", NatsMessenger::NAME)
                .to_ascii_lowercase(),
            dispatch_subscription: env_or("DISPATCH_SUBSCRIPTION", "orchestra.dispatch"),
            status_messenger: env_or("STATUS_MESSENGER", NatsMessenger::NAME).to_ascii_lowercase(),
            status_topic: env_or("STATUS_TOPIC", "orchestra.status"),
            messenger: MessengerConfig::from_env()?,
            slurm: SlurmConfig::from_env()?,
        })
    }
}
