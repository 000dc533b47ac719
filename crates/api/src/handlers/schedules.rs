//! Handlers for the `/schedules` resource.
//!
//! Creating schedules requires a [`CallerIdentity`]; reads are open.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use orchestra_core::error::CoreError;
use orchestra_core::types::Id;
use orchestra_db::models::schedule::ScheduleFilter;
use orchestra_flow::FlowStatus;
use serde::Deserialize;
use validator::Validate;

use crate::engine::schedule_flow::{persisted_schedule, schedule_job};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Between 1 and 100 jobs per request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSchedulesRequest {
    #[validate(length(min = 1, max = 100))]
    pub job_ids: Vec<Id>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/schedules
///
/// Runs the create-schedule saga once per job, in request order, and returns
/// 201 with the created schedules. The first failing job stops the request;
/// its saga has already been compensated, while schedules created for
/// earlier jobs stay dispatched.
pub async fn create_schedules(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Json(input): Json<CreateSchedulesRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let ctx = state.schedule_context();
    let mut schedules = Vec::with_capacity(input.job_ids.len());

    for job_id in input.job_ids {
        let flow = schedule_job(&ctx, job_id, &caller.user_id)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        if flow.status() != FlowStatus::Passed {
            return Err(flow.first_error().map(AppError::from).unwrap_or_else(|| {
                AppError::InternalError(format!("Flow for job {job_id} failed without an error"))
            }));
        }

        let schedule = persisted_schedule(&flow).ok_or_else(|| {
            AppError::InternalError(format!("Flow for job {job_id} passed without a schedule"))
        })?;
        schedules.push(schedule);
    }

    tracing::info!(
        owner_id = %caller.user_id,
        count = schedules.len(),
        "Schedules created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: schedules })))
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// GET /api/v1/schedules
///
/// Optional `job_id`, `owner_id`, `cluster_id` and `status` query
/// parameters narrow the result; newest first.
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(filter): Query<ScheduleFilter>,
) -> AppResult<impl IntoResponse> {
    let schedules = state.store.query_schedules(&filter).await?;
    Ok(Json(DataResponse { data: schedules }))
}

/// GET /api/v1/schedules/{id}
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let schedule = state
        .store
        .get_schedule(schedule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Schedule",
            id: schedule_id,
        }))?;
    Ok(Json(DataResponse { data: schedule }))
}
