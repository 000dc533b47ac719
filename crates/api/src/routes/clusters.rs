//! Route definitions for the `/clusters` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::clusters;
use crate::state::AppState;

/// Routes mounted at `/clusters`.
///
/// ```text
/// GET    /                -> list_clusters
/// POST   /                -> create_cluster
/// GET    /{id}            -> get_cluster
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(clusters::list_clusters).post(clusters::create_cluster),
        )
        .route("/{id}", get(clusters::get_cluster))
}
