//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use orchestra_core::error::CoreError;
use orchestra_core::types::Id;
use orchestra_db::models::job::NewJob;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for registering a job. The caller becomes its owner.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub script: String,
    #[serde(default)]
    pub specification: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    pub cluster_caps_req: Option<String>,
}

/// POST /api/v1/jobs
pub async fn create_job(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Json(input): Json<CreateJobRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let job = state
        .store
        .insert_job(&NewJob {
            name: input.name,
            description: input.description,
            script: input.script,
            specification: input.specification,
            metadata: input.metadata,
            cluster_caps_req: input.cluster_caps_req,
            owner_id: caller.user_id,
        })
        .await?;

    tracing::info!(job_id = %job.id, owner_id = %job.owner_id, "Job created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}
