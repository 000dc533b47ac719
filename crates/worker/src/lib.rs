//! Worker side of the conductor: receives dispatched schedules, submits them
//! to a cluster backend and reports status back over the message bus.

pub mod cli;
pub mod commands;
pub mod config;

use orchestra_cluster::ClusterError;
use orchestra_core::config::ConfigError;
use orchestra_messenger::MessengerError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Unknown cluster backend {0:?}")]
    UnknownBackend(String),

    #[error("Messenger {0:?} is not enabled")]
    UnknownMessenger(String),

    #[error("Unable to encode status update: {0}")]
    Encode(#[from] serde_json::Error),
}
