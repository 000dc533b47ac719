//! Cluster submission backends and the worker-side dispatch handler.
//!
//! A [`ClusterBackend`] turns a dispatch payload into files on disk and a
//! job in an external batch scheduler, and can report that job's status.
//! [`SlurmCluster`] is the only backend today; it arranges for hook jobs
//! that call back into the worker binary so status updates flow back over
//! the message bus.

use std::path::PathBuf;

use async_trait::async_trait;
use orchestra_core::message::DispatchPayload;
use orchestra_core::registry::Registry;

pub mod command;
pub mod handler;
pub mod hooks;
pub mod slurm;
pub mod status;

pub use command::{CommandError, CommandOutput};
pub use handler::DispatchHandler;
pub use slurm::{SlurmCluster, SlurmConfig};
pub use status::{overall_status, JobStatusRecord};

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    /// The submit command succeeded but printed no usable job id.
    #[error("Unable to parse job id from submit output {0:?}")]
    UnparseableSubmitOutput(String),
}

impl ClusterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Registry name, matched against `CLUSTER_BACKEND`.
    fn name(&self) -> &str;

    /// Write the job script, lifecycle hooks and output directory into the
    /// job's working directory, overwriting previous contents. Returns the
    /// directory.
    async fn prepare_job(&self, dispatch: &DispatchPayload) -> Result<PathBuf, ClusterError>;

    /// Prepare and submit the job, returning the backend's job id.
    async fn submit_job(&self, dispatch: &DispatchPayload) -> Result<String, ClusterError>;

    /// One record per attempt/step the backend knows about.
    async fn get_job_status(&self, external_id: &str) -> Result<Vec<JobStatusRecord>, ClusterError>;
}

pub type ClusterBackendRegistry = Registry<dyn ClusterBackend>;
