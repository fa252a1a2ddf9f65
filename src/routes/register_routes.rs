//! Public organization sign-up.
//!
//! Unlike the authenticated API this endpoint answers `{ok: true}` or a flat
//! `{message}` body, which is what the sign-up page expects.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{MIN_PASSWORD_LEN, hash_password},
    error::MessageError,
    models::{AppState, NewTenant, NewUser, Role},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

/// Missing fields deserialize as blank so validation can name them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub nome: String,
    pub email: String,
    pub empresa_nome: String,
    pub cnpj_cpf: String,
    pub telefone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
}

const CNPJ_DIGITS: usize = 14;

/// Splits the combined document field into `(cnpj, cpf)` by digit count.
fn classify_document(raw: &str) -> (Option<String>, Option<String>) {
    let doc = raw.trim().to_string();
    let digits = doc.chars().filter(char::is_ascii_digit).count();
    if digits == CNPJ_DIGITS {
        (Some(doc), None)
    } else {
        (None, Some(doc))
    }
}

fn required(field: &str, value: &str) -> Result<String, MessageError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(MessageError::bad_request(format!("{field} is required")));
    }
    Ok(v.to_string())
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, MessageError> {
    let Json(req) = payload.map_err(|_| MessageError::bad_request("Invalid JSON"))?;
    let name = required("nome", &req.nome)?;
    let email = required("email", &req.email)?.to_lowercase();
    let company = required("empresaNome", &req.empresa_nome)?;
    let document = required("cnpjCpf", &req.cnpj_cpf)?;
    if !email.contains('@') {
        return Err(MessageError::bad_request("email is invalid"));
    }

    let password_hash = match req.password.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(pw) if pw.chars().count() < MIN_PASSWORD_LEN => {
            return Err(MessageError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Some(pw) => Some(
            hash_password(pw).map_err(|e| MessageError(StatusCode::INTERNAL_SERVER_ERROR, e))?,
        ),
    };

    let (cnpj, cpf) = classify_document(&document);
    let phone = req
        .telefone
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let (tenant, user) = state
        .store
        .create_tenant_with_admin(
            NewTenant {
                name: company,
                cnpj,
                cpf,
                phone,
                email: Some(email.clone()),
            },
            NewUser {
                name,
                email,
                role: Role::Admin,
                password_hash,
            },
        )
        .await?;

    tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "organization registered");
    Ok(Json(RegisterResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourteen_digits_is_a_cnpj() {
        let (cnpj, cpf) = classify_document(" 12.345.678/0001-90 ");
        assert_eq!(cnpj.as_deref(), Some("12.345.678/0001-90"));
        assert!(cpf.is_none());

        let (cnpj, cpf) = classify_document("123.456.789-09");
        assert!(cnpj.is_none());
        assert_eq!(cpf.as_deref(), Some("123.456.789-09"));
    }

    #[test]
    fn blank_required_field_names_the_field() {
        let err = required("empresaNome", "   ").unwrap_err();
        assert_eq!(err.1, "empresaNome is required");
    }
}
