use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::orders::PaymentStatus;

/// Payment row, 1:1 with its order. `provider_payment_id` is unique when
/// present; cash orders carry a synthetic id minted at assembly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount: Decimal,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub external_reference: Uuid,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Raw webhook body as delivered by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub action: Option<String>,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: Option<String>,
    pub status: Option<String>,
    pub external_reference: Option<Uuid>,
}

/// The three webhook outcomes the gateway can report for a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    Approved,
    Rejected,
    Pending,
}

impl WebhookStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(WebhookStatus::Approved),
            "rejected" => Some(WebhookStatus::Rejected),
            "pending" | "in_process" => Some(WebhookStatus::Pending),
            _ => None,
        }
    }
}

/// What a webhook delivery did. Everything except a malformed payload is
/// acknowledged with 200 so the provider stops retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State advanced
    Applied,
    /// Replay of an already-applied event; no state change
    Duplicate,
    /// Unknown payment, non-payment event, or informational status
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_status_parsing() {
        assert_eq!(WebhookStatus::parse("approved"), Some(WebhookStatus::Approved));
        assert_eq!(WebhookStatus::parse("rejected"), Some(WebhookStatus::Rejected));
        assert_eq!(WebhookStatus::parse("pending"), Some(WebhookStatus::Pending));
        assert_eq!(WebhookStatus::parse("in_process"), Some(WebhookStatus::Pending));
        assert_eq!(WebhookStatus::parse("chargeback"), None);
    }

    #[test]
    fn test_webhook_payload_deserializes_gateway_shape() {
        let body = serde_json::json!({
            "type": "payment",
            "action": "payment.updated",
            "data": {
                "id": "1234567890",
                "status": "approved",
                "external_reference": "6f9619ff-8b86-d011-b42d-00cf4fc964ff"
            }
        });
        let payload: WebhookPayload = serde_json::from_value(body).unwrap();
        assert_eq!(payload.event_type.as_deref(), Some("payment"));
        let data = payload.data.unwrap();
        assert_eq!(data.id.as_deref(), Some("1234567890"));
        assert_eq!(data.status.as_deref(), Some("approved"));
        assert!(data.external_reference.is_some());
    }
}
