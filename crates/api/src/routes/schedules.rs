//! Route definitions for the `/schedules` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::schedules;
use crate::state::AppState;

/// Routes mounted at `/schedules`.
///
/// ```text
/// GET    /                -> list_schedules
/// POST   /                -> create_schedules
/// GET    /{id}            -> get_schedule
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(schedules::list_schedules).post(schedules::create_schedules),
        )
        .route("/{id}", get(schedules::get_schedule))
}
