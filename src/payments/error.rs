use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{error_response, internal_error_response};

/// Error types for payment operations
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),

    #[error("Order not found")]
    OrderNotFound,
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        PaymentError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match self {
            PaymentError::DatabaseError(msg) => {
                tracing::error!("Database error in payments: {}", msg);
                return internal_error_response().into_response();
            }
            PaymentError::Gateway(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_GATEWAY_ERROR"),
            PaymentError::MalformedWebhook(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PaymentError::OrderNotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        };

        let (status, body) = error_response(status, code, message);
        (status, body).into_response()
    }
}
