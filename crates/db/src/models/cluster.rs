use orchestra_core::types::{Id, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `clusters` table. Read-only to the scheduling core.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Id,
    pub name: String,
    /// Backend kind, e.g. `slurm`.
    pub cluster_type: String,
    pub capabilities: Option<String>,
    pub status: String,
    /// Name of the registered messenger dispatches are sent through.
    pub messenger: String,
    /// Topic dispatches for this cluster are published on.
    pub messenger_queue: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Where dispatch messages for a cluster go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportBinding<'a> {
    pub messenger: &'a str,
    pub topic: &'a str,
}

impl Cluster {
    pub fn transport_binding(&self) -> TransportBinding<'_> {
        TransportBinding {
            messenger: &self.messenger,
            topic: &self.messenger_queue,
        }
    }
}

/// DTO for registering a cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCluster {
    pub name: String,
    pub cluster_type: String,
    pub capabilities: Option<String>,
    pub messenger: String,
    pub messenger_queue: String,
}
