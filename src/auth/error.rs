use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::error_response;

/// Error types for authentication and authorization
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingToken,

    #[error("Bearer token is invalid")]
    InvalidToken,

    #[error("Bearer token has expired")]
    TokenExpired,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                self.to_string(),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                self.to_string(),
            ),
            AuthError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                self.to_string(),
            ),
            AuthError::AccountInactive => (
                StatusCode::UNAUTHORIZED,
                "ACCOUNT_INACTIVE",
                self.to_string(),
            ),
            AuthError::InsufficientPermissions(msg) => {
                tracing::warn!("Permission denied: {}", msg);
                (
                    StatusCode::FORBIDDEN,
                    "INSUFFICIENT_PERMISSIONS",
                    msg.clone(),
                )
            }
            AuthError::Forbidden(msg) => {
                tracing::warn!("Forbidden access attempt: {}", msg);
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AuthError::DatabaseError(msg) => {
                tracing::error!("Database error during auth: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let (status, body) = error_response(status, code, message);
        (status, body).into_response()
    }
}
