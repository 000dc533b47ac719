//! Cluster selection policies.
//!
//! A [`Scheduler`] picks the cluster a job should run on from the pool of
//! known clusters. Policies are pure: they read the job and the pool and
//! return an id, nothing else.

use std::sync::Arc;

use orchestra_core::registry::Registry;
use orchestra_core::types::Id;
use orchestra_db::models::cluster::Cluster;
use orchestra_db::models::job::Job;

mod random;

pub use random::RandomScheduler;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The pool was empty. Not retryable; shown to users.
    #[error("No cluster available to schedule job {job_id}")]
    NoClusterAvailable { job_id: Id },
}

pub trait Scheduler: Send + Sync {
    /// Registry name of the policy.
    fn name(&self) -> &str;

    /// Pick the cluster `job` should run on. The returned id is always a
    /// member of `pool`.
    fn schedule(&self, job: &Job, pool: &[Cluster]) -> Result<Id, SchedulerError>;
}

pub type SchedulerRegistry = Registry<dyn Scheduler>;

/// Registry holding every built-in policy.
pub fn default_registry() -> SchedulerRegistry {
    SchedulerRegistry::new().with(RandomScheduler::NAME, Arc::new(RandomScheduler::new()))
}
