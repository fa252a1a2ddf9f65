use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiOk;
use crate::{
    auth::{MIN_PASSWORD_LEN, generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Tenant, UserProfile},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/change_password", post(change_password))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TenantProfile {
    pub tenant_id: Uuid,
    pub name: String,
}

impl From<Tenant> for TenantProfile {
    fn from(t: Tenant) -> Self {
        Self {
            tenant_id: t.id,
            name: t.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub tenant: Option<TenantProfile>,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
    pub tenant: TenantProfile,
    pub session_token_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/* ============================================================
   POST /auth/login
   ============================================================ */

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    let verified = user
        .password_hash
        .as_deref()
        .is_some_and(|h| verify_password(&req.password, h));
    if !verified {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(ApiError::invalid_credentials());
    }

    let access_token = generate_access_token();
    let expires_at = state.calendar.now() + Duration::hours(state.session_ttl_hours);
    let session = state
        .store
        .create_session(user.id, &hash_access_token(&access_token), expires_at)
        .await?;

    let tenant = state.store.find_tenant(user.tenant_id).await?;
    tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "login");

    Ok(Json(ApiOk {
        data: LoginData {
            access_token,
            expires_at: session.expires_at,
            user: UserProfile::from(&user),
            tenant: tenant.map(TenantProfile::from),
        },
    }))
}

/* ============================================================
   GET /auth/me
   ============================================================ */

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;
    let tenant = state
        .store
        .find_tenant(auth.tenant_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeData {
            user: UserProfile::from(&user),
            tenant: tenant.into(),
            session_token_id: auth.session_token_id,
        },
    }))
}

/* ============================================================
   POST /auth/logout
   ============================================================ */

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let revoked = state
        .store
        .revoke_session(auth.session_token_id, state.calendar.now())
        .await?;
    if !revoked {
        return Err(ApiError::session_expired());
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

/* ============================================================
   POST /auth/change_password
   ============================================================ */

fn validate_new_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "new_password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation("old_password and new_password are required"));
    }
    validate_new_password(&req.new_password)?;

    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|h| verify_password(&req.old_password, h));
    if !matches {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(&req.new_password).map_err(ApiError::Internal)?;
    state.store.set_password(user.id, &new_hash).await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
