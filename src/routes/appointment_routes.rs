use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiOk;
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Appointment, AppointmentStatus},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/appointments/{id}/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

/* ============================================================
   PATCH /appointments/{id}/status
   ============================================================ */

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let updated = state
        .store
        .set_appointment_status(&auth.scope(), id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Appointment not found".into()))?;

    tracing::info!(appointment_id = %id, status = req.status.as_str(), "appointment status changed");
    Ok(Json(ApiOk { data: updated }))
}
