use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

/// Failures reported by a store backend.
///
/// `Relationship` covers schema-shaped failures (missing table, column or
/// foreign key) that make a joined read impossible on a given deployment.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("relationship unavailable: {0}")]
    Relationship(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Database(String),
}

// Postgres SQLSTATEs for undefined table / column / object.
const SCHEMA_STATES: [&str; 3] = ["42P01", "42703", "42704"];
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return StoreError::NotFound("row");
        }
        let code = e
            .as_database_error()
            .and_then(|d| d.code())
            .map(|c| c.to_string());
        match code.as_deref() {
            Some(c) if SCHEMA_STATES.contains(&c) => StoreError::Relationship(e.to_string()),
            Some(UNIQUE_VIOLATION) => StoreError::Conflict(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "E-mail or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound("NOT_FOUND", format!("{what} not found")),
            StoreError::Conflict(msg) => ApiError::Conflict("CONFLICT", msg),
            StoreError::Relationship(msg) | StoreError::Database(msg) => {
                ApiError::Internal(format!("db error: {msg}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

/// Flat `{"message": ...}` error body used by the public registration endpoint.
#[derive(Debug)]
pub struct MessageError(pub StatusCode, pub String);

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

impl MessageError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        MessageError(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<StoreError> for MessageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => {
                MessageError::bad_request("An account with this e-mail already exists")
            }
            other => MessageError(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for MessageError {
    fn into_response(self) -> Response {
        (self.0, Json(MessageBody { message: self.1 })).into_response()
    }
}
