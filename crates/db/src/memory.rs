//! In-process [`Store`] for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;
use tokio::sync::RwLock;

use crate::models::cluster::{Cluster, NewCluster};
use crate::models::job::{Job, NewJob};
use crate::models::schedule::{NewSchedule, Schedule, ScheduleFilter, ScheduleUpdate};
use crate::store::{Store, StoreError};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<Id, Job>,
    clusters: HashMap<Id, Cluster>,
    schedules: HashMap<Id, Schedule>,
}

/// A [`Store`] holding every table in memory behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_job(&self, input: &NewJob) -> Result<Job, StoreError> {
        self.check_writable()?;
        let now = Utc::now();
        let job = Job {
            id: Id::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            script: input.script.clone(),
            specification: input.specification.clone(),
            metadata: input.metadata.clone(),
            cluster_caps_req: input.cluster_caps_req.clone(),
            owner_id: input.owner_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Id) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn insert_cluster(&self, input: &NewCluster) -> Result<Cluster, StoreError> {
        self.check_writable()?;
        let now = Utc::now();
        let cluster = Cluster {
            id: Id::new_v4(),
            name: input.name.clone(),
            cluster_type: input.cluster_type.clone(),
            capabilities: input.capabilities.clone(),
            status: "ACTIVE".to_string(),
            messenger: input.messenger.clone(),
            messenger_queue: input.messenger_queue.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .clusters
            .insert(cluster.id, cluster.clone());
        Ok(cluster)
    }

    async fn get_cluster(&self, id: Id) -> Result<Option<Cluster>, StoreError> {
        Ok(self.tables.read().await.clusters.get(&id).cloned())
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        let mut clusters: Vec<Cluster> =
            self.tables.read().await.clusters.values().cloned().collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }

    async fn insert_schedule(&self, input: &NewSchedule) -> Result<Schedule, StoreError> {
        self.check_writable()?;
        let now = Utc::now();
        let schedule = Schedule {
            id: input.id,
            job_id: input.job_id,
            assigned_cluster_id: input.assigned_cluster_id,
            owner_id: input.owner_id.clone(),
            status: ScheduleStatus::Pending,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .schedules
            .insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Id) -> Result<Option<Schedule>, StoreError> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn update_schedule(
        &self,
        id: Id,
        update: &ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let Some(schedule) = tables.schedules.get_mut(&id) else {
            return Ok(None);
        };
        if update
            .expected_status
            .is_some_and(|expected| expected != schedule.status)
        {
            return Ok(None);
        }
        if let Some(status) = update.status {
            schedule.status = status;
        }
        if let Some(started_at) = update.started_at {
            schedule.started_at = Some(started_at);
        }
        if let Some(finished_at) = update.finished_at {
            schedule.finished_at = Some(finished_at);
        }
        schedule.updated_at = Utc::now();
        Ok(Some(schedule.clone()))
    }

    async fn delete_schedule(&self, id: Id) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.tables.write().await.schedules.remove(&id).is_some())
    }

    async fn query_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, StoreError> {
        let mut schedules: Vec<Schedule> = self
            .tables
            .read()
            .await
            .schedules
            .values()
            .filter(|schedule| filter.matches(schedule))
            .cloned()
            .collect();
        schedules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(schedules)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
