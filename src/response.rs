// Success envelope shared by every JSON endpoint.
// Errors use the mirrored envelope in error.rs.

use axum::Json;
use serde::Serialize;

/// Standard success body: `{"status": "success", "message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success with a payload
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            message: message.into(),
            data: Some(data),
        })
    }

    /// Success with no payload (deletes, acks)
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success",
            message: message.into(),
            data: None,
        })
    }
}
