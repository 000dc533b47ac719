//! Handlers for the `/clusters` resource.
//!
//! A cluster can only be registered on a messenger this server has enabled,
//! otherwise nothing could ever be dispatched to it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use orchestra_core::error::CoreError;
use orchestra_core::types::Id;
use orchestra_db::models::cluster::NewCluster;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClusterRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Backend kind, e.g. `slurm`.
    #[validate(length(min = 1))]
    pub cluster_type: String,
    pub capabilities: Option<String>,
    /// Registry name of the messenger dispatches go through.
    #[validate(length(min = 1))]
    pub messenger: String,
    /// Topic dispatches are published on.
    #[validate(length(min = 1))]
    pub messenger_queue: String,
}

/// POST /api/v1/clusters
pub async fn create_cluster(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Json(input): Json<CreateClusterRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let messenger = input.messenger.to_ascii_lowercase();
    if !state.messengers.contains(&messenger) {
        return Err(AppError::BadRequest(format!(
            "Messenger {messenger:?} is not enabled; expected one of {:?}",
            state.messengers.names()
        )));
    }

    let cluster = state
        .store
        .insert_cluster(&NewCluster {
            name: input.name,
            cluster_type: input.cluster_type,
            capabilities: input.capabilities,
            messenger,
            messenger_queue: input.messenger_queue,
        })
        .await?;

    tracing::info!(
        cluster_id = %cluster.id,
        cluster = %cluster.name,
        messenger = %cluster.messenger,
        topic = %cluster.messenger_queue,
        registered_by = %caller.user_id,
        "Cluster registered",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: cluster })))
}

/// GET /api/v1/clusters
pub async fn list_clusters(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let clusters = state.store.list_clusters().await?;
    Ok(Json(DataResponse { data: clusters }))
}

/// GET /api/v1/clusters/{id}
pub async fn get_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let cluster = state
        .store
        .get_cluster(cluster_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Cluster",
            id: cluster_id,
        }))?;
    Ok(Json(DataResponse { data: cluster }))
}
