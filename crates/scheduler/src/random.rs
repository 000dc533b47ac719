use std::sync::Mutex;

use orchestra_core::types::Id;
use orchestra_db::models::cluster::Cluster;
use orchestra_db::models::job::Job;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::{Scheduler, SchedulerError};

/// Uniform random choice over the pool. Ignores capabilities and load.
#[derive(Debug)]
pub struct RandomScheduler {
    rng: Mutex<StdRng>,
}

impl RandomScheduler {
    pub const NAME: &'static str = "random";

    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sequence of choices, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RandomScheduler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schedule(&self, job: &Job, pool: &[Cluster]) -> Result<Id, SchedulerError> {
        // A poisoned lock still holds a usable generator.
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cluster = pool
            .choose(&mut *rng)
            .ok_or(SchedulerError::NoClusterAvailable { job_id: job.id })?;

        tracing::debug!(
            job_id = %job.id,
            cluster_id = %cluster.id,
            pool_size = pool.len(),
            "Selected cluster",
        );
        Ok(cluster.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
