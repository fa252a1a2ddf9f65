use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiOk;
use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Exercise, NewExercise, Role},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exercises", get(list_exercises).post(add_exercise))
        .route("/exercises/seed", post(seed_catalog))
}

const BASIC_LEVEL: &str = "basico";

/// Built-in Pilates repertoire, `(category, name)`, all at the basic level.
const GLOBAL_CATALOG: &[(&str, &str)] = &[
    ("Solo", "Hundred"),
    ("Solo", "Roll Up"),
    ("Solo", "Single Leg Circles"),
    ("Solo", "Rolling Like a Ball"),
    ("Solo", "Single Leg Stretch"),
    ("Solo", "Double Leg Stretch"),
    ("Solo", "Spine Stretch Forward"),
    ("Solo", "Open Leg Rocker (apoio)"),
    ("Solo", "Corkscrew (inicial)"),
    ("Solo", "Saw"),
    ("Solo", "Swan Prep"),
    ("Solo", "Single Leg Kick"),
    ("Solo", "Double Leg Kick"),
    ("Solo", "Neck Pull (facilitado)"),
    ("Solo", "Shoulder Bridge"),
    ("Solo", "Side Kick Series"),
    ("Solo", "Teaser (com apoio)"),
    ("Solo", "Seal (básico)"),
    ("Reformer", "Footwork Series (Toes / Arches / Heels / Tendon Stretch)"),
    ("Reformer", "Hundred"),
    ("Reformer", "Leg Circles / Frogs"),
    ("Reformer", "Stomach Massage Series (Round / Hands Back / Reach)"),
    ("Reformer", "Short Box Series (Round / Flat / Side to Side)"),
    ("Reformer", "Elephant"),
    ("Reformer", "Knee Stretches (Round / Arched)"),
    ("Reformer", "Running"),
    ("Reformer", "Pelvic Lift"),
    ("Cadillac", "Breathing"),
    ("Cadillac", "Roll Back"),
    ("Cadillac", "Leg Springs Series (Supine)"),
    ("Cadillac", "Arm Springs Series (Supine)"),
    ("Cadillac", "Monkey"),
    ("Cadillac", "Push Through (deitado/sentado)"),
    ("Cadillac", "Tower Prep"),
    ("Cadillac", "Teaser Prep"),
    ("Wunda Chair", "Footwork on Chair"),
    ("Wunda Chair", "Pumping One and Two Legs"),
    ("Wunda Chair", "Spine Stretch Forward"),
    ("Wunda Chair", "Swan"),
    ("Wunda Chair", "Mermaid"),
    ("Wunda Chair", "Push Down Series"),
    ("Wunda Chair", "Pull Up Prep"),
    ("Barrel", "Swan"),
    ("Barrel", "Leg Series (Side Leg Lift / Side Kick)"),
    ("Barrel", "Short Box Series adaptada"),
    ("Barrel", "Back Extension"),
    ("Barrel", "Hamstring Stretch"),
];

fn global_catalog() -> Vec<NewExercise> {
    GLOBAL_CATALOG
        .iter()
        .map(|(category, name)| NewExercise {
            category: Some((*category).to_string()),
            name: (*name).to_string(),
            level: Some(BASIC_LEVEL.to_string()),
            description: None,
        })
        .collect()
}

/* ============================================================
   GET /exercises
   ============================================================ */

pub async fn list_exercises(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Exercise>>>, ApiError> {
    let rows = state.store.list_exercises(&auth.scope()).await?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   POST /exercises
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AddExerciseRequest {
    #[serde(default)]
    pub nome: String,
    pub descricao: Option<String>,
    pub categoria: Option<String>,
    pub nivel: Option<String>,
}

const LEVELS: [&str; 3] = ["basico", "intermediario", "avancado"];

pub async fn add_exercise(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<AddExerciseRequest>,
) -> Result<Json<ApiOk<Exercise>>, ApiError> {
    let name = req.nome.trim();
    if name.is_empty() {
        return Err(ApiError::validation("nome is required"));
    }
    let level = req
        .nivel
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty());
    if let Some(l) = level.as_deref() {
        if !LEVELS.contains(&l) {
            return Err(ApiError::validation(format!("nivel must be one of {}", LEVELS.join(", "))));
        }
    }

    let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let exercise = state
        .store
        .insert_exercise(
            &auth.scope(),
            NewExercise {
                category: clean(req.categoria),
                name: name.to_string(),
                level,
                description: clean(req.descricao),
            },
        )
        .await?;

    Ok(Json(ApiOk { data: exercise }))
}

/* ============================================================
   POST /exercises/seed
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct SeedData {
    pub ok: bool,
    pub inserted: u64,
    pub already_present: bool,
}

pub async fn seed_catalog(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<SeedData>>, ApiError> {
    if auth.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only administrators can seed the catalog".into(),
        ));
    }

    if state.store.count_global_exercises().await? > 0 {
        return Ok(Json(ApiOk {
            data: SeedData {
                ok: true,
                inserted: 0,
                already_present: true,
            },
        }));
    }

    let inserted = state.store.insert_global_exercises(&global_catalog()).await?;
    tracing::info!(inserted, "global exercise catalog seeded");

    Ok(Json(ApiOk {
        data: SeedData {
            ok: true,
            inserted,
            already_present: false,
        },
    }))
}
