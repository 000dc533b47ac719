pub mod clusters;
pub mod health;
pub mod jobs;
pub mod schedules;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /clusters                  register (POST), list (GET)
/// /clusters/{id}             get
/// /jobs                      create (POST)
/// /jobs/{id}                 get
/// /schedules                 create (POST), query (GET)
/// /schedules/{id}            get
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/clusters", clusters::router())
        .nest("/jobs", jobs::router())
        .nest("/schedules", schedules::router())
}
