// Error envelope shared by every module
//
// Domain modules (auth, cart, orders, payments, dispatch) define their own
// error enums and IntoResponse impls; they all render through the helpers
// here so each response carries a stable machine-readable code in the
// `{"status": "error", "message", "code", "errors?"}` shape.

use axum::{http::StatusCode, response::Json};
use serde::Serialize;

/// Consistent error response structure.
/// `errors` carries field-level validation details and is omitted otherwise.
#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            code: code.to_string(),
            errors: None,
        }
    }
}

/// Build the `(status, body)` pair used by every error IntoResponse impl
pub fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (status, Json(ErrorBody::new(code, message)))
}

/// Opaque 500 body; callers log the original error before reaching for this
pub fn internal_error_response() -> (StatusCode, Json<ErrorBody>) {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal server error occurred",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody::new("ORDER_NOT_FOUND", "Order with id 9 not found");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "ORDER_NOT_FOUND");
        assert_eq!(json["message"], "Order with id 9 not found");
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let (status, body) = internal_error_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0.code, "INTERNAL_ERROR");
        assert_eq!(body.0.message, "An internal server error occurred");
    }
}
