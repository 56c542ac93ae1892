use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;

use crate::auth::AuthError;
use crate::error::{error_response, internal_error_response};
use crate::orders::OrderStatus;

/// Error types for order assembly and lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Order not found")]
    NotFound,

    #[error("Address not found")]
    AddressNotFound,

    #[error("Branch not found")]
    BranchNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("The branch is currently closed")]
    BranchClosed,

    #[error("Product {0} is no longer available")]
    ProductUnavailable(i32),

    #[error("Price of product {product_id} changed to {current_price}; refresh your cart and retry")]
    PriceDrift {
        product_id: i32,
        current_price: Decimal,
    },

    #[error("Invalid status transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("The order changed while processing; refresh and retry")]
    StaleState,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match self {
            OrderError::Auth(err) => return err.into_response(),
            OrderError::DatabaseError(msg) => {
                tracing::error!("Database error in orders: {}", msg);
                return internal_error_response().into_response();
            }
            OrderError::NotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            OrderError::AddressNotFound => (StatusCode::NOT_FOUND, "ADDRESS_NOT_FOUND"),
            OrderError::BranchNotFound => (StatusCode::NOT_FOUND, "BRANCH_NOT_FOUND"),
            OrderError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART"),
            OrderError::BranchClosed => (StatusCode::BAD_REQUEST, "BRANCH_CLOSED"),
            OrderError::ProductUnavailable(_) => {
                (StatusCode::BAD_REQUEST, "PRODUCT_UNAVAILABLE")
            }
            OrderError::PriceDrift { .. } => (StatusCode::CONFLICT, "PRICE_DRIFT"),
            OrderError::IllegalTransition { .. } => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
            OrderError::StaleState => (StatusCode::CONFLICT, "STALE_STATE"),
            OrderError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        };

        let (status, body) = error_response(status, code, message);
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_drift_is_conflict() {
        let err = OrderError::PriceDrift {
            product_id: 4,
            current_price: dec!(120.00),
        };
        assert!(err.to_string().contains("120.00"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_illegal_transition_is_conflict() {
        let err = OrderError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_branch_closed_is_bad_request() {
        let response = OrderError::BranchClosed.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
