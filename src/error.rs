//! Application error type and its HTTP rendering.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{debug, error};

/// Message sent for every authentication failure, whatever the cause.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed. Please log in again.";

/// Why an authentication attempt was rejected. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NotLoggedIn,
    InvalidCredentials,
    InvalidToken,
    UserGone,
    Inactive,
    PasswordChanged,
    ResetTokenInvalid,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed. Please log in again.")]
    Authentication(AuthFailure),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Service(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Service(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal reason for an authentication failure, if this is one.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            AppError::Authentication(reason) => Some(*reason),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Authentication(reason) => debug!(?reason, "authentication rejected"),
            AppError::Internal(e) => error!(error = %e, "internal error"),
            AppError::Service(msg) => error!(error = %msg, "collaborator failure"),
            _ => {}
        }

        let body = serde_json::json!({
            "status": if status.is_server_error() { "error" } else { "fail" },
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
