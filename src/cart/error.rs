use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::AuthError;
use crate::error::{error_response, internal_error_response};

/// Error types for cart operations
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(i32),

    #[error("Cart item not found")]
    ItemNotFound,

    #[error("Invalid modifier selection: {0}")]
    InvalidModifiers(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        CartError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match self {
            CartError::Auth(err) => return err.into_response(),
            CartError::DatabaseError(msg) => {
                tracing::error!("Database error in cart: {}", msg);
                return internal_error_response().into_response();
            }
            CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            CartError::ProductUnavailable(_) => (StatusCode::BAD_REQUEST, "PRODUCT_UNAVAILABLE"),
            CartError::ItemNotFound => (StatusCode::NOT_FOUND, "CART_ITEM_NOT_FOUND"),
            CartError::InvalidModifiers(_) | CartError::ValidationError(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
        };

        let (status, body) = error_response(status, code, message);
        (status, body).into_response()
    }
}
