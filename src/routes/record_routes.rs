//! Per-patient clinical records: session log, anamnesis and report data.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiOk;
use super::patient_routes::load_patient;
use crate::{
    agenda::quick_create::DEFAULT_KIND,
    clock::LocalCalendar,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        Anamnesis, AppState, Appointment, AppointmentStatus, NewAppointment, PAIN_MAX, PAIN_MIN,
        Patient,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/patients/{patient_id}/sessions",
            get(list_sessions).post(register_session),
        )
        .route(
            "/patients/{patient_id}/anamnesis",
            get(get_anamnesis).put(save_anamnesis),
        )
        .route("/patients/{patient_id}/report", get(report))
}

pub const REPORT_TITLE: &str = "Relatório do Paciente - PhysioPro";

fn br_date(calendar: &LocalCalendar, appointment: &Appointment) -> String {
    calendar
        .local_date(appointment.at)
        .format("%d/%m/%Y")
        .to_string()
}

/* ============================================================
   GET /patients/{id}/sessions
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct PainPoint {
    pub date: String,
    pub pain: i16,
}

#[derive(Debug, Serialize)]
pub struct SessionLog {
    pub sessions: Vec<Appointment>,
    pub pain_series: Vec<PainPoint>,
}

fn pain_series(calendar: &LocalCalendar, sessions: &[Appointment]) -> Vec<PainPoint> {
    sessions
        .iter()
        .map(|s| PainPoint {
            date: br_date(calendar, s),
            pain: s.pain.unwrap_or(0),
        })
        .collect()
}

pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<SessionLog>>, ApiError> {
    let scope = auth.scope();
    load_patient(state.store.as_ref(), &scope, patient_id).await?;

    let sessions = state.store.appointments_for_patient(&scope, patient_id).await?;
    let pain_series = pain_series(&state.calendar, &sessions);

    Ok(Json(ApiOk {
        data: SessionLog {
            sessions,
            pain_series,
        },
    }))
}

/* ============================================================
   POST /patients/{id}/sessions
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterSessionRequest {
    /// Local `YYYY-MM-DDTHH:MM[:SS]`.
    pub data: String,
    pub tipo: Option<String>,
    pub observacoes: Option<String>,
    #[serde(default)]
    pub dor: i16,
    pub evolucao: Option<String>,
    pub status: Option<AppointmentStatus>,
}

fn parse_local_datetime(raw: &str) -> Result<NaiveDateTime, ApiError> {
    let raw = raw.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ApiError::validation(format!("invalid data: {raw}")))
}

fn validate_pain(pain: i16) -> Result<i16, ApiError> {
    if !(PAIN_MIN..=PAIN_MAX).contains(&pain) {
        return Err(ApiError::validation(format!(
            "dor must be between {PAIN_MIN} and {PAIN_MAX}"
        )));
    }
    Ok(pain)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn register_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<RegisterSessionRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let local = parse_local_datetime(&req.data)?;
    let at = state
        .calendar
        .to_utc(local)
        .ok_or_else(|| ApiError::validation(format!("data out of range: {local}")))?;
    let pain = validate_pain(req.dor)?;

    let scope = auth.scope();
    load_patient(state.store.as_ref(), &scope, patient_id).await?;

    let session = state
        .store
        .insert_appointment(
            &scope,
            NewAppointment {
                at,
                patient_id: Some(patient_id),
                kind: Some(non_blank(req.tipo).unwrap_or_else(|| DEFAULT_KIND.to_string())),
                status: req.status.unwrap_or(AppointmentStatus::Completed),
                pain,
                notes: non_blank(req.observacoes),
                evolution: non_blank(req.evolucao),
            },
        )
        .await?;

    tracing::info!(appointment_id = %session.id, patient_id = %patient_id, "session registered");
    Ok(Json(ApiOk { data: session }))
}

/* ============================================================
   GET | PUT /patients/{id}/anamnesis
   ============================================================ */

pub async fn get_anamnesis(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Anamnesis>>, ApiError> {
    let scope = auth.scope();
    load_patient(state.store.as_ref(), &scope, patient_id).await?;

    let form = state
        .store
        .get_anamnesis(&scope, patient_id)
        .await?
        .unwrap_or_default();
    Ok(Json(ApiOk { data: form }))
}

pub async fn save_anamnesis(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(form): Json<Anamnesis>,
) -> Result<Json<ApiOk<Anamnesis>>, ApiError> {
    let scope = auth.scope();
    load_patient(state.store.as_ref(), &scope, patient_id).await?;

    let saved = state
        .store
        .upsert_anamnesis(&scope, patient_id, form.normalized())
        .await?;
    tracing::info!(patient_id = %patient_id, "anamnesis saved");
    Ok(Json(ApiOk { data: saved }))
}

/* ============================================================
   GET /patients/{id}/report
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ReportData {
    pub title: &'static str,
    pub patient_line: String,
    pub session_count: usize,
    pub lines: Vec<String>,
    pub file_name: String,
    pub generated_on: NaiveDate,
}

fn session_line(calendar: &LocalCalendar, s: &Appointment) -> String {
    let line = format!(
        "{} - {} · Dor: {} · {}",
        br_date(calendar, s),
        s.kind.as_deref().unwrap_or(""),
        s.pain.unwrap_or(0),
        s.evolution.as_deref().unwrap_or(""),
    );
    line.trim_end_matches([' ', '·']).to_string()
}

fn build_report(calendar: &LocalCalendar, patient: &Patient, sessions: &[Appointment]) -> ReportData {
    ReportData {
        title: REPORT_TITLE,
        patient_line: format!("Paciente: {} (CPF {})", patient.name, patient.tax_id),
        session_count: sessions.len(),
        lines: sessions.iter().map(|s| session_line(calendar, s)).collect(),
        file_name: format!("relatorio_{}.pdf", patient.name),
        generated_on: calendar.today(),
    }
}

pub async fn report(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<ReportData>>, ApiError> {
    let scope = auth.scope();
    let patient = load_patient(state.store.as_ref(), &scope, patient_id).await?;
    let sessions = state.store.appointments_for_patient(&scope, patient_id).await?;

    Ok(Json(ApiOk {
        data: build_report(&state.calendar, &patient, &sessions),
    }))
}
