use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiOk;
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, TimeRange},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub greeting: String,
    pub appointments_today: i64,
    pub active_patients: i64,
}

/// Capitalizes each word; `_` and `.` count as separators.
fn title_case(s: &str) -> String {
    s.replace(['_', '.'], " ")
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn professional_title(word: &str) -> Option<&'static str> {
    match word.to_lowercase().replace('.', "").as_str() {
        "dra" | "doutora" => Some("Dra"),
        "dr" | "doutor" => Some("Dr"),
        _ => None,
    }
}

/// "Dra Maria" from "maria souza"; keeps a title already present in the name.
pub fn greeting_for(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let Some(first) = words.first() else {
        return "profissional".to_string();
    };

    match professional_title(first) {
        Some(title) => match words.get(1) {
            Some(given) => format!("{title} {}", title_case(given)),
            None => title.to_string(),
        },
        None => format!("Dra {}", title_case(first)),
    }
}

/// Display name, or the title-cased e-mail local part when the name is blank.
fn display_name(name: &str, email: &str) -> String {
    if !name.trim().is_empty() {
        return name.trim().to_string();
    }
    email
        .split('@')
        .next()
        .map(title_case)
        .unwrap_or_default()
}

/* ============================================================
   GET /dashboard
   ============================================================ */

pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DashboardData>>, ApiError> {
    let scope = auth.scope();
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    let today = state.calendar.today();
    let (Some(start), Some(end)) = (
        state.calendar.midnight(today),
        today.succ_opt().and_then(|next| state.calendar.midnight(next)),
    ) else {
        return Err(ApiError::Internal(format!("clock date {today} out of range")));
    };
    let today = TimeRange { start, end };

    let appointments_today = state.store.count_appointments_in_range(&scope, today).await?;
    let active_patients = state.store.count_active_patients(&scope).await?;

    Ok(Json(ApiOk {
        data: DashboardData {
            greeting: greeting_for(&display_name(&user.name, &user.email)),
            appointments_today,
            active_patients,
        },
    }))
}
