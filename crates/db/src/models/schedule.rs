use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::{Id, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `schedules` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Id,
    pub job_id: Id,
    pub assigned_cluster_id: Id,
    pub owner_id: String,
    #[sqlx(try_from = "String")]
    pub status: ScheduleStatus,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a schedule. Always starts `PENDING`.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub id: Id,
    pub job_id: Id,
    pub assigned_cluster_id: Id,
    pub owner_id: String,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleUpdate {
    pub status: Option<ScheduleStatus>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    /// Apply only while the stored status still equals this value.
    pub expected_status: Option<ScheduleStatus>,
}

impl ScheduleUpdate {
    /// `true` when no column would change. `expected_status` is a guard,
    /// not a change.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.started_at.is_none() && self.finished_at.is_none()
    }
}

/// Query filter for schedules; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScheduleFilter {
    pub job_id: Option<Id>,
    pub owner_id: Option<String>,
    pub cluster_id: Option<Id>,
    pub status: Option<ScheduleStatus>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        self.job_id.map_or(true, |id| id == schedule.job_id)
            && self
                .owner_id
                .as_deref()
                .map_or(true, |owner| owner == schedule.owner_id)
            && self
                .cluster_id
                .map_or(true, |id| id == schedule.assigned_cluster_id)
            && self.status.map_or(true, |status| status == schedule.status)
    }
}
