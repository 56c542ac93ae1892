use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::AuthError;
use crate::error::{error_response, internal_error_response};

/// Error types for dispatch and courier operations
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order was already taken by another driver")]
    AlreadyTaken,

    #[error("Driver is not eligible for this order")]
    NotEligible,

    #[error("Order is not assigned to this driver")]
    NotAssigned,

    #[error("Driver profile not found")]
    ProfileNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        DispatchError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match self {
            DispatchError::Auth(err) => return err.into_response(),
            DispatchError::DatabaseError(msg) => {
                tracing::error!("Database error in dispatch: {}", msg);
                return internal_error_response().into_response();
            }
            DispatchError::OrderNotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            DispatchError::AlreadyTaken => (StatusCode::CONFLICT, "ORDER_ALREADY_TAKEN"),
            DispatchError::NotEligible => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            DispatchError::NotAssigned => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            DispatchError::ProfileNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DispatchError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        };

        let (status, body) = error_response(status, code, message);
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_taken_is_conflict() {
        let response = DispatchError::AlreadyTaken.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_assigned_is_forbidden() {
        let response = DispatchError::NotAssigned.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
