use axum::Router;
use serde::Serialize;

use crate::models::AppState;

pub mod agenda_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod dashboard_routes;
pub mod exercise_routes;
pub mod patient_routes;
pub mod record_routes;
pub mod register_routes;

/// Success envelope shared by the `/api/v1` handlers.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", register_routes::router())
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", agenda_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1", record_routes::router())
        .nest("/api/v1", exercise_routes::router())
        .nest("/api/v1", dashboard_routes::router())
        .with_state(state)
}
