use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiOk;
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, NewPatient, Patient, PatientFilter, TenantScope},
    store::ClinicStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/{patient_id}", get(get_patient))
        .route("/patients/{patient_id}/toggle_active", post(toggle_active))
}

pub(crate) fn patient_not_found() -> ApiError {
    ApiError::NotFound("NOT_FOUND", "Patient not found".into())
}

/// Loads a patient of the caller's tenant or answers 404.
pub(crate) async fn load_patient(
    store: &dyn ClinicStore,
    scope: &TenantScope,
    patient_id: Uuid,
) -> Result<Patient, ApiError> {
    store
        .get_patient(scope, patient_id)
        .await?
        .ok_or_else(patient_not_found)
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/* ============================================================
   GET /patients?search=&only_active=
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub only_active: bool,
}

pub async fn list_patients(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<Patient>>>, ApiError> {
    let filter = PatientFilter {
        search: trimmed(q.search),
        only_active: q.only_active,
    };
    let rows = state.store.list_patients(&auth.scope(), &filter).await?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   POST /patients
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub cpf: String,
    pub diagnostico: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    pub telefone: Option<String>,
    pub email: Option<String>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let name = req.nome.trim();
    let tax_id = req.cpf.trim();
    if name.is_empty() || tax_id.is_empty() {
        return Err(ApiError::validation("nome and cpf are required"));
    }

    let patient = state
        .store
        .insert_patient(
            &auth.scope(),
            NewPatient {
                name: name.to_string(),
                tax_id: tax_id.to_string(),
                diagnosis: trimmed(req.diagnostico),
                birth_date: req.data_nascimento,
                phone: trimmed(req.telefone),
                email: trimmed(req.email),
            },
        )
        .await?;

    tracing::info!(patient_id = %patient.id, tenant_id = %auth.tenant_id, "patient created");
    Ok(Json(ApiOk { data: patient }))
}

/* ============================================================
   GET /patients/{id}
   ============================================================ */

pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let patient = load_patient(state.store.as_ref(), &auth.scope(), patient_id).await?;
    Ok(Json(ApiOk { data: patient }))
}

/* ============================================================
   POST /patients/{id}/toggle_active
   ============================================================ */

pub async fn toggle_active(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let scope = auth.scope();
    let current = load_patient(state.store.as_ref(), &scope, patient_id).await?;

    let updated = state
        .store
        .set_patient_active(&scope, patient_id, !current.active)
        .await?
        .ok_or_else(patient_not_found)?;

    tracing::info!(patient_id = %patient_id, active = updated.active, "patient active flag toggled");
    Ok(Json(ApiOk { data: updated }))
}
