use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure kinds surfaced by the user core. Display strings are the exact
/// messages returned to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already exists")]
    EmailExists,

    #[error("User not found")]
    NotFound,

    // Same message for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Carries only the caller-facing message; the cause is logged where it happens.
    #[error("{0}")]
    Internal(&'static str),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) | UserError::EmailExists => StatusCode::BAD_REQUEST,
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
