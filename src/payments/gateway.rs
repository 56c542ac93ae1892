// Payment gateway seam
//
// Production talks to Mercado Pago's preference API; the trait keeps the
// coordinator testable and the HTTP details in one place. All requests are
// bounded by a 5 second timeout.

use axum::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error types for gateway calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// What the coordinator supplies when opening a payment intent
#[derive(Debug, Clone)]
pub struct PreferenceRequest {
    pub order_id: i64,
    pub total: Decimal,
    pub external_reference: Uuid,
    pub description: String,
}

/// The gateway's answer: intent id plus the customer redirect URL
#[derive(Debug, Clone)]
pub struct PreferenceResponse {
    pub id: String,
    pub redirect_url: String,
}

/// Seam for the external payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError>;
}

#[derive(Serialize)]
struct PreferenceItemBody {
    title: String,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
}

#[derive(Serialize)]
struct PreferenceBody {
    items: Vec<PreferenceItemBody>,
    external_reference: String,
    notification_url: String,
}

#[derive(Deserialize)]
struct PreferenceCreated {
    id: String,
    init_point: String,
}

/// Mercado Pago preference client
pub struct MercadoPagoGateway {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    notification_url: String,
}

impl MercadoPagoGateway {
    pub fn new(
        base_url: String,
        access_token: String,
        notification_url: String,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            access_token,
            notification_url,
        })
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError> {
        let url = format!("{}/checkout/preferences", self.base_url);

        let body = PreferenceBody {
            items: vec![PreferenceItemBody {
                title: request.description.clone(),
                quantity: 1,
                unit_price: request.total,
            }],
            external_reference: request.external_reference.to_string(),
            notification_url: self.notification_url.clone(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let created: PreferenceCreated = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            "Gateway preference {} created for order {}",
            created.id,
            request.order_id
        );

        Ok(PreferenceResponse {
            id: created.id,
            redirect_url: created.init_point,
        })
    }
}
