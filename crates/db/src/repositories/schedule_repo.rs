//! Repository for the `schedules` table.
//!
//! Rows are inserted by the create-schedule flow, patched by the status
//! reconciler and deleted only when the flow compensates its own insert.

use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;
use sqlx::PgPool;

use crate::models::schedule::{NewSchedule, Schedule, ScheduleFilter, ScheduleUpdate};

/// Column list for `schedules` queries.
const COLUMNS: &str = "\
    id, job_id, assigned_cluster_id, owner_id, status, \
    started_at, finished_at, created_at, updated_at";

pub struct ScheduleRepo;

impl ScheduleRepo {
    /// Insert a `PENDING` schedule with a caller-chosen id.
    pub async fn create(pool: &PgPool, input: &NewSchedule) -> Result<Schedule, sqlx::Error> {
        let query = format!(
            "INSERT INTO schedules (id, job_id, assigned_cluster_id, owner_id, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Schedule>(&query)
            .bind(input.id)
            .bind(input.job_id)
            .bind(input.assigned_cluster_id)
            .bind(&input.owner_id)
            .bind(ScheduleStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Id) -> Result<Option<Schedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM schedules WHERE id = $1");
        sqlx::query_as::<_, Schedule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update in one statement. Returns `None` if the row
    /// does not exist or its status no longer equals `expected_status`.
    pub async fn update(
        pool: &PgPool,
        id: Id,
        input: &ScheduleUpdate,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        let query = format!(
            "UPDATE schedules SET \
                status = COALESCE($2, status), \
                started_at = COALESCE($3, started_at), \
                finished_at = COALESCE($4, finished_at), \
                updated_at = NOW() \
             WHERE id = $1 \
               AND ($5::TEXT IS NULL OR status = $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Schedule>(&query)
            .bind(id)
            .bind(input.status.map(ScheduleStatus::as_str))
            .bind(input.started_at)
            .bind(input.finished_at)
            .bind(input.expected_status.map(ScheduleStatus::as_str))
            .fetch_optional(pool)
            .await
    }

    /// Delete a schedule. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: Id) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Schedules matching every set field of `filter`, newest first.
    pub async fn query(pool: &PgPool, filter: &ScheduleFilter) -> Result<Vec<Schedule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM schedules \
             WHERE ($1::UUID IS NULL OR job_id = $1) \
               AND ($2::TEXT IS NULL OR owner_id = $2) \
               AND ($3::UUID IS NULL OR assigned_cluster_id = $3) \
               AND ($4::TEXT IS NULL OR status = $4) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Schedule>(&query)
            .bind(filter.job_id)
            .bind(filter.owner_id.as_deref())
            .bind(filter.cluster_id)
            .bind(filter.status.map(ScheduleStatus::as_str))
            .fetch_all(pool)
            .await
    }
}
