//! The persistence seam used by the scheduling core.
//!
//! Each method is its own transaction boundary; callers that need several
//! writes to succeed together compose them through a saga instead.

use async_trait::async_trait;
use orchestra_core::types::Id;

use crate::models::cluster::{Cluster, NewCluster};
use crate::models::job::{Job, NewJob};
use crate::models::schedule::{NewSchedule, Schedule, ScheduleFilter, ScheduleUpdate};
use crate::repositories::{ClusterRepo, JobRepo, ScheduleRepo};
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backing store refused the operation (e.g. a memory store
    /// configured to fail writes).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_job(&self, input: &NewJob) -> Result<Job, StoreError>;
    async fn get_job(&self, id: Id) -> Result<Option<Job>, StoreError>;

    async fn insert_cluster(&self, input: &NewCluster) -> Result<Cluster, StoreError>;
    async fn get_cluster(&self, id: Id) -> Result<Option<Cluster>, StoreError>;
    /// Every known cluster; the pool the scheduler selects from.
    async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError>;

    async fn insert_schedule(&self, input: &NewSchedule) -> Result<Schedule, StoreError>;
    async fn get_schedule(&self, id: Id) -> Result<Option<Schedule>, StoreError>;
    /// Returns `None` when no schedule has `id`, or when
    /// `update.expected_status` is set and the stored status differs. The
    /// guard and the write are one atomic step.
    async fn update_schedule(
        &self,
        id: Id,
        update: &ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError>;
    /// Returns `true` if a row was removed.
    async fn delete_schedule(&self, id: Id) -> Result<bool, StoreError>;
    async fn query_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`Store`] backed by the Postgres repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn insert_job(&self, input: &NewJob) -> Result<Job, StoreError> {
        Ok(JobRepo::create(&self.pool, input).await?)
    }

    async fn get_job(&self, id: Id) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn insert_cluster(&self, input: &NewCluster) -> Result<Cluster, StoreError> {
        Ok(ClusterRepo::create(&self.pool, input).await?)
    }

    async fn get_cluster(&self, id: Id) -> Result<Option<Cluster>, StoreError> {
        Ok(ClusterRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        Ok(ClusterRepo::list(&self.pool).await?)
    }

    async fn insert_schedule(&self, input: &NewSchedule) -> Result<Schedule, StoreError> {
        Ok(ScheduleRepo::create(&self.pool, input).await?)
    }

    async fn get_schedule(&self, id: Id) -> Result<Option<Schedule>, StoreError> {
        Ok(ScheduleRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update_schedule(
        &self,
        id: Id,
        update: &ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError> {
        Ok(ScheduleRepo::update(&self.pool, id, update).await?)
    }

    async fn delete_schedule(&self, id: Id) -> Result<bool, StoreError> {
        Ok(ScheduleRepo::delete(&self.pool, id).await?)
    }

    async fn query_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, StoreError> {
        Ok(ScheduleRepo::query(&self.pool, filter).await?)
    }
}
