use orchestra_core::types::{Id, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `jobs` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: Id,
    pub name: String,
    pub description: String,
    /// Shell script executed on the cluster.
    pub script: String,
    pub specification: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    /// Free-form capability requirements forwarded to the worker.
    pub cluster_caps_req: Option<String>,
    pub owner_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub script: String,
    #[serde(default)]
    pub specification: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    pub cluster_caps_req: Option<String>,
    pub owner_id: String,
}
