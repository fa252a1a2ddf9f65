use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiOk;
use crate::{
    agenda::{
        Agenda, AgendaView,
        navigator::{AgendaNavigator, Step},
        quick_create::{QuickCreate, QuickCreateError, QuickCreated},
        window::{OutOfRange, ViewMode, ViewWindow},
    },
    error::{ApiError, StoreError},
    middleware::auth_context::AuthContext,
    models::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agenda", get(get_agenda))
        .route("/agenda/quick_create", post(quick_create))
}

/* ============================================================
   GET /agenda?date=YYYY-MM-DD&view=week&step=next&generation=3
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    /// Defaults to today in clinic time.
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub view: ViewMode,
    /// Applied to `date` before loading.
    pub step: Option<Step>,
    /// Client request counter, echoed back. A response whose generation is
    /// not the client's latest belongs to a superseded request.
    pub generation: Option<u64>,
}

fn out_of_range(e: OutOfRange) -> ApiError {
    ApiError::validation(e.to_string())
}

pub async fn get_agenda(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<AgendaQuery>,
) -> Result<Json<ApiOk<AgendaView>>, ApiError> {
    let date = q.date.unwrap_or_else(|| state.calendar.today());

    let mut nav = AgendaNavigator::new(date, q.view);
    if let Some(step) = q.step {
        nav.navigate(step, &state.calendar);
    }

    let mut view = Agenda::from_state(&state)
        .load(&auth.scope(), nav.anchor(), nav.mode())
        .await
        .map_err(out_of_range)?;
    view.generation = q.generation;

    Ok(Json(ApiOk { data: view }))
}

/* ============================================================
   POST /agenda/quick_create
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct QuickCreateRequest {
    #[serde(flatten)]
    pub slot: QuickCreate,
    /// Agenda view to return after the insert; defaults to the day of the slot.
    pub view: Option<ViewMode>,
}

#[derive(Debug, Serialize)]
pub struct QuickCreateData {
    pub created: QuickCreated,
    pub agenda: AgendaView,
}

fn quick_create_failed(e: StoreError) -> ApiError {
    ApiError::BadRequest("QUICK_CREATE_FAILED", e.to_string())
}

pub async fn quick_create(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<QuickCreateRequest>,
) -> Result<Json<ApiOk<QuickCreateData>>, ApiError> {
    let scope = auth.scope();
    let agenda = Agenda::from_state(&state);
    let day = req.slot.date;
    let mode = req.view.unwrap_or(ViewMode::Day);
    ViewWindow::compute(day, mode, &state.calendar).map_err(out_of_range)?;

    let created = match agenda.quick_create(&scope, req.slot).await {
        Ok(c) => c,
        Err(QuickCreateError::Invalid(msg)) => return Err(ApiError::validation(msg)),
        Err(QuickCreateError::Store(e)) => {
            tracing::warn!(error = %e, tenant_id = %scope.tenant_id, "quick create failed");
            return Err(quick_create_failed(e));
        }
    };

    let refreshed = agenda.load(&scope, day, mode).await.map_err(out_of_range)?;

    Ok(Json(ApiOk {
        data: QuickCreateData {
            created,
            agenda: refreshed,
        },
    }))
}
