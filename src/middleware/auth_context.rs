use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Role, TenantScope};

/// The authenticated principal and the tenant it belongs to.
///
/// Extracting it runs the session guard (bearer token -> live session) and
/// then the tenant resolver (user -> `empresa_id`). Handlers that take an
/// `AuthContext` never see a request without both.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub session_token_id: Uuid,
}

impl AuthContext {
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            tenant_id: self.tenant_id,
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());
            let now = state.calendar.now();

            let session = state
                .store
                .find_session(&token_hash, now)
                .await?
                .ok_or_else(|| {
                    tracing::debug!("rejected unknown or expired session");
                    ApiError::session_expired()
                })?;

            // best-effort
            if let Err(e) = state.store.touch_session(session.session_token_id, now).await {
                tracing::debug!(error = %e, "failed to touch session");
            }

            let user = state
                .store
                .find_user(session.user_id)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            if state.store.find_tenant(user.tenant_id).await?.is_none() {
                tracing::warn!(user_id = %user.id, "user has no organization");
                return Err(ApiError::Forbidden(
                    "NO_TENANT",
                    "User is not linked to an organization".into(),
                ));
            }

            Ok(AuthContext {
                user_id: user.id,
                tenant_id: user.tenant_id,
                role: user.role,
                session_token_id: session.session_token_id,
            })
        }
    }
}
