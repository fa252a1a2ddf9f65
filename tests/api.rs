use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use physiopro::{
    agenda::names::{JoinStrategy, NameResolver},
    build_app,
    clock::{FixedClock, LocalCalendar},
    models::{AppState, WorkHours},
    store::{ClinicStore, MemoryStore},
};

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
}

/// App pinned to Wednesday 2024-06-05 12:00 clinic time (UTC-3).
fn test_app_with(store: MemoryStore, strategy: JoinStrategy) -> TestApp {
    let store = Arc::new(store);
    let dyn_store: Arc<dyn ClinicStore> = store.clone();
    let now = Utc.with_ymd_and_hms(2024, 6, 5, 15, 0, 0).unwrap();
    let state = AppState {
        store: dyn_store,
        calendar: LocalCalendar::from_offset_minutes(-180, Arc::new(FixedClock(now))),
        names: NameResolver::new(strategy),
        session_ttl_hours: 24,
        work_hours: WorkHours::default(),
    };
    TestApp {
        app: build_app(state),
        store,
    }
}

fn test_app() -> TestApp {
    test_app_with(MemoryStore::new(), JoinStrategy::Joined)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&v).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "nome": "Dra Helena Costa",
            "email": email,
            "empresaNome": "Clínica Movimento",
            "cnpjCpf": "12.345.678/0001-90",
            "password": "senha-segura"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);

    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "senha-segura" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn create_patient(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/patients",
        Some(token),
        Some(json!({ "nome": name, "cpf": "98765432100" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn register_session(app: &Router, token: &str, patient_id: &str, data: &str, status: &str) {
    let (code, body) = send(
        app,
        "POST",
        &format!("/api/v1/patients/{patient_id}/sessions"),
        Some(token),
        Some(json!({ "data": data, "tipo": "Pilates", "dor": 3, "status": status })),
    )
    .await;
    assert_eq!(code, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn me_returns_user_and_organization() {
    let t = test_app();
    let token = register_and_login(&t.app, "helena@clinica.com").await;

    let (status, body) = send(&t.app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "helena@clinica.com");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert_eq!(body["data"]["tenant"]["name"], "Clínica Movimento");
}

#[tokio::test]
async fn registration_rejects_duplicates_and_blank_fields() {
    let t = test_app();
    register_and_login(&t.app, "dup@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "nome": "Outra",
            "email": "DUP@clinica.com",
            "empresaNome": "Outra Clínica",
            "cnpjCpf": "123.456.789-09"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("already exists"));

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/register",
        None,
        Some(json!({ "nome": "X", "email": "x@y.com", "cnpjCpf": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "empresaNome is required");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let t = test_app();
    register_and_login(&t.app, "login@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "login@clinica.com", "password": "errada-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn agenda_requires_a_session() {
    let t = test_app();

    let (status, body) = send(&t.app, "GET", "/api/v1/agenda", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "SESSION_EXPIRED");

    let (status, _) = send(&t.app, "GET", "/api/v1/agenda", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let t = test_app();
    let token = register_and_login(&t.app, "bye@clinica.com").await;

    let (status, _) = send(&t.app, "POST", "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&t.app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn week_agenda_buckets_by_local_day_and_hides_cancelled() {
    let t = test_app();
    let token = register_and_login(&t.app, "week@clinica.com").await;
    let patient = create_patient(&t.app, &token, "Rafael Nunes").await;

    register_session(&t.app, &token, &patient, "2024-06-05T14:30", "agendado").await;
    register_session(&t.app, &token, &patient, "2024-06-05T16:00", "cancelado").await;

    let (status, body) = send(
        &t.app,
        "GET",
        "/api/v1/agenda?date=2024-06-05&view=week&generation=7",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let data = &body["data"];
    assert_eq!(data["generation"], 7);
    assert_eq!(data["window"]["first_day"], "2024-06-03");
    assert_eq!(data["window"]["last_day"], "2024-06-09");
    assert!(data["error"].is_null());

    let days = data["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[2]["date"], "2024-06-05");
    assert_eq!(days[2]["is_today"], true);

    let items = days[2]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["patient_name"], "Rafael Nunes");
    assert_eq!(items[0]["at"], "2024-06-05T17:30:00Z");

    let total: usize = days.iter().map(|d| d["items"].as_array().unwrap().len()).sum();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn agenda_step_moves_the_window() {
    let t = test_app();
    let token = register_and_login(&t.app, "nav@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "GET",
        "/api/v1/agenda?date=2024-01-31&view=month&step=next",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["window"]["reference"], "2024-02-01");
    assert_eq!(body["data"]["window"]["first_day"], "2024-01-29");
    assert_eq!(body["data"]["window"]["last_day"], "2024-03-03");
}

#[tokio::test]
async fn quick_create_with_new_name_creates_patient() {
    let t = test_app();
    let token = register_and_login(&t.app, "quick@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "2024-06-05", "hour": 9, "patient_name": "Maria Silva" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let created = &body["data"]["created"];
    assert_eq!(created["patient_created"], true);
    assert_eq!(created["patient"]["name"], "Maria Silva");
    assert_eq!(created["appointment"]["at"], "2024-06-05T12:00:00Z");
    assert_eq!(created["appointment"]["status"], "agendado");
    assert_eq!(created["appointment"]["pain"], 0);
    assert_eq!(created["appointment"]["kind"], "Sessão");

    let slots = body["data"]["agenda"]["slots"].as_array().unwrap();
    let nine = slots.iter().find(|s| s["hour"] == 9).unwrap();
    assert_eq!(nine["appointment"]["patient_name"], "Maria Silva");

    // Same name in another case reuses the patient.
    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "2024-06-05", "hour": 10, "patient_name": "  maria silva" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["created"]["patient_created"], false);

    let (_, body) = send(&t.app, "GET", "/api/v1/patients", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn quick_create_failure_reports_and_leaves_nothing() {
    let t = test_app();
    let token = register_and_login(&t.app, "fail@clinica.com").await;
    t.store.fail_appointment_writes(true);

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "2024-06-05", "hour": 9, "patient_name": "Paulo" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "QUICK_CREATE_FAILED");

    let (_, body) = send(&t.app, "GET", "/api/v1/patients", Some(&token), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn quick_create_validates_the_slot() {
    let t = test_app();
    let token = register_and_login(&t.app, "slot@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "2024-06-05", "hour": 25 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn dates_at_the_calendar_edge_are_rejected() {
    let t = test_app();
    let token = register_and_login(&t.app, "edge@clinica.com").await;

    let (status, body) = send(
        &t.app,
        "GET",
        "/api/v1/agenda?date=%2B262142-12-31&view=week",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "+262142-12-31", "hour": 23, "patient_name": "Borda" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = send(&t.app, "GET", "/api/v1/patients", Some(&token), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn names_resolve_without_join_support() {
    let t = test_app_with(MemoryStore::new().without_patient_join(), JoinStrategy::Joined);
    let token = register_and_login(&t.app, "batch@clinica.com").await;
    let patient = create_patient(&t.app, &token, "Lúcia Prado").await;
    register_session(&t.app, &token, &patient, "2024-06-05T10:00", "agendado").await;

    let (status, body) = send(
        &t.app,
        "GET",
        "/api/v1/agenda?date=2024-06-05&view=day",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["days"][0]["items"][0]["patient_name"], "Lúcia Prado");
}

#[tokio::test]
async fn agenda_store_failure_is_an_error_state() {
    let t = test_app();
    let token = register_and_login(&t.app, "down@clinica.com").await;
    t.store.fail_appointment_reads(true);

    let (status, body) = send(
        &t.app,
        "GET",
        "/api/v1/agenda?date=2024-06-05&view=month",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["error"].is_string());
    assert!(body["data"]["days"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tenants_cannot_read_each_other() {
    let t = test_app();
    let a = register_and_login(&t.app, "a@clinica.com").await;
    let b = register_and_login(&t.app, "b@clinica.com").await;
    let patient = create_patient(&t.app, &a, "Somente A").await;

    let (status, _) = send(&t.app, "GET", &format!("/api/v1/patients/{patient}"), Some(&b), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, "GET", &format!("/api/v1/patients/{patient}"), Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn patient_records_flow() {
    let t = test_app();
    let token = register_and_login(&t.app, "records@clinica.com").await;
    let patient = create_patient(&t.app, &token, "Beatriz Ramos").await;

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/patients/{patient}/sessions"),
        Some(&token),
        Some(json!({ "data": "2024-06-04T09:00", "dor": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    register_session(&t.app, &token, &patient, "2024-06-04T09:00", "concluido").await;

    let (_, body) = send(
        &t.app,
        "GET",
        &format!("/api/v1/patients/{patient}/sessions"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pain_series"][0]["date"], "04/06/2024");
    assert_eq!(body["data"]["pain_series"][0]["pain"], 3);

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/v1/patients/{patient}/anamnesis"),
        Some(&token),
        Some(json!({ "chief_complaint": " dor no ombro ", "limitations": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["chief_complaint"], "dor no ombro");
    assert!(body["data"]["limitations"].is_null());

    let (_, body) = send(
        &t.app,
        "GET",
        &format!("/api/v1/patients/{patient}/report"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["patient_line"], "Paciente: Beatriz Ramos (CPF 98765432100)");
    assert_eq!(body["data"]["lines"][0], "04/06/2024 - Pilates · Dor: 3");

    let (_, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/patients/{patient}/toggle_active"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["active"], false);

    let (_, body) = send(&t.app, "GET", "/api/v1/patients?only_active=true", Some(&token), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_counts_today() {
    let t = test_app();
    let token = register_and_login(&t.app, "dash@clinica.com").await;
    let patient = create_patient(&t.app, &token, "Otávio").await;
    register_session(&t.app, &token, &patient, "2024-06-05T08:00", "agendado").await;
    register_session(&t.app, &token, &patient, "2024-06-05T09:00", "cancelado").await;
    register_session(&t.app, &token, &patient, "2024-06-06T09:00", "agendado").await;

    let (status, body) = send(&t.app, "GET", "/api/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["appointments_today"], 1);
    assert_eq!(body["data"]["active_patients"], 1);
    assert_eq!(body["data"]["greeting"], "Dra Helena");
}

#[tokio::test]
async fn exercise_catalog_seeds_once() {
    let t = test_app();
    let token = register_and_login(&t.app, "ex@clinica.com").await;

    let (status, body) = send(&t.app, "POST", "/api/v1/exercises/seed", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let inserted = body["data"]["inserted"].as_u64().unwrap();
    assert!(inserted > 0);

    let (_, body) = send(&t.app, "POST", "/api/v1/exercises/seed", Some(&token), None).await;
    assert_eq!(body["data"]["inserted"], 0);
    assert_eq!(body["data"]["already_present"], true);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/v1/exercises",
        Some(&token),
        Some(json!({ "nome": "Ponte unilateral", "nivel": "intermediario" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&t.app, "GET", "/api/v1/exercises", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len() as u64, inserted + 1);
}

#[tokio::test]
async fn appointment_status_can_be_cancelled() {
    let t = test_app();
    let token = register_and_login(&t.app, "status@clinica.com").await;

    let (_, body) = send(
        &t.app,
        "POST",
        "/api/v1/agenda/quick_create",
        Some(&token),
        Some(json!({ "date": "2024-06-05", "hour": 11 })),
    )
    .await;
    let id = body["data"]["created"]["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &t.app,
        "PATCH",
        &format!("/api/v1/appointments/{id}/status"),
        Some(&token),
        Some(json!({ "status": "cancelado" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelado");

    let (_, body) = send(&t.app, "GET", "/api/v1/agenda?date=2024-06-05&view=day", Some(&token), None).await;
    assert!(body["data"]["days"][0]["items"].as_array().unwrap().is_empty());

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(
        &t.app,
        "PATCH",
        &format!("/api/v1/appointments/{missing}/status"),
        Some(&token),
        Some(json!({ "status": "concluido" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
