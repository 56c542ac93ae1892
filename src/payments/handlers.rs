// HTTP handler for the payment gateway webhook

use axum::{extract::State, Json};

use crate::payments::error::PaymentError;
use crate::payments::models::{WebhookOutcome, WebhookPayload};
use crate::response::ApiResponse;

/// Handler for POST /api/webhooks/mercadopago
///
/// Always acknowledges with 200 unless the payload is malformed, so the
/// provider does not keep retrying deliveries we have already applied or
/// deliberately ignored.
pub async fn webhook_handler(
    State(state): State<crate::AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<()>>, PaymentError> {
    let payload: WebhookPayload = serde_json::from_value(body)
        .map_err(|e| PaymentError::MalformedWebhook(e.to_string()))?;

    let outcome = state.payment_service.handle_webhook(payload).await?;

    let message = match outcome {
        WebhookOutcome::Applied => "Payment event applied",
        WebhookOutcome::Duplicate => "Payment event already applied",
        WebhookOutcome::Ignored => "Payment event acknowledged",
    };

    Ok(ApiResponse::message(message))
}
