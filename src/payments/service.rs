use std::sync::Arc;
use uuid::Uuid;

use crate::orders::repository::OrdersRepository;
use crate::orders::service::order_event_payload;
use crate::orders::{Order, PaymentStatus};
use crate::payments::error::PaymentError;
use crate::payments::gateway::{PaymentGateway, PreferenceRequest, PreferenceResponse};
use crate::payments::models::{Payment, WebhookOutcome, WebhookPayload, WebhookStatus};
use crate::payments::repository::PaymentsRepository;
use crate::realtime::{EventType, RealtimeBus};

/// Coordinates payment intents and the idempotent webhook pipeline
#[derive(Clone)]
pub struct PaymentService {
    pool: sqlx::PgPool,
    gateway: Arc<dyn PaymentGateway>,
    payments: PaymentsRepository,
    orders: OrdersRepository,
    realtime: Arc<RealtimeBus>,
}

impl PaymentService {
    pub fn new(
        pool: sqlx::PgPool,
        gateway: Arc<dyn PaymentGateway>,
        payments: PaymentsRepository,
        orders: OrdersRepository,
        realtime: Arc<RealtimeBus>,
    ) -> Self {
        Self {
            pool,
            gateway,
            payments,
            orders,
            realtime,
        }
    }

    /// Open a payment intent for a freshly assembled card order.
    ///
    /// On success the gateway's intent id lands on the payment row. On
    /// failure the payment and the order's payment_status flip to failed
    /// while order.status stays pending so the customer can retry.
    pub async fn create_preference(
        &self,
        order: &Order,
        external_reference: Uuid,
    ) -> Result<PreferenceResponse, PaymentError> {
        let request = PreferenceRequest {
            order_id: order.id,
            total: order.total,
            external_reference,
            description: format!("Delixmi order #{}", order.id),
        };

        match self.gateway.create_preference(&request).await {
            Ok(preference) => {
                self.payments
                    .set_provider_payment_id(order.id, &preference.id)
                    .await?;
                tracing::info!(
                    "Preference {} opened for order {}",
                    preference.id,
                    order.id
                );
                Ok(preference)
            }
            Err(e) => {
                tracing::error!("Gateway rejected preference for order {}: {}", order.id, e);
                self.mark_payment_failed(order.id).await?;

                if let Ok(Some(restaurant_id)) = self.orders.restaurant_of_order(order.id).await {
                    self.realtime
                        .emit_to_user(
                            order.customer_id,
                            EventType::PaymentFailed,
                            order_event_payload(order, restaurant_id),
                        )
                        .await;
                }

                Err(PaymentError::Gateway(e.to_string()))
            }
        }
    }

    /// Consume one webhook delivery.
    ///
    /// Idempotent by (provider, provider_payment_id) or external_reference:
    /// replays and unknown events acknowledge without touching state, and
    /// the state changes themselves are conditional updates, so a delivery
    /// applied twice is indistinguishable from one applied once.
    pub async fn handle_webhook(
        &self,
        payload: WebhookPayload,
    ) -> Result<WebhookOutcome, PaymentError> {
        let (status, provider_payment_id, external_reference) = match classify(&payload)? {
            Some(parts) => parts,
            None => return Ok(WebhookOutcome::Ignored),
        };

        let payment = match self
            .payments
            .find_by_webhook_keys(provider_payment_id.as_deref(), external_reference)
            .await?
        {
            Some(payment) => payment,
            None => {
                tracing::warn!(
                    "Webhook for unknown payment (provider id {:?}, reference {:?})",
                    provider_payment_id,
                    external_reference
                );
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match status {
            WebhookStatus::Approved => {
                self.apply_approved(payment, provider_payment_id.as_deref())
                    .await
            }
            WebhookStatus::Rejected => self.apply_rejected(payment).await,
            WebhookStatus::Pending => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn apply_approved(
        &self,
        payment: Payment,
        provider_payment_id: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        if payment.status == PaymentStatus::Completed {
            return Ok(WebhookOutcome::Duplicate);
        }

        let order = self
            .orders
            .find_by_id(payment.order_id)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::OrderNotFound)?;

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'completed',
                provider_payment_id = COALESCE(provider_payment_id, $2)
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(payment.id)
        .bind(provider_payment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows == 0 {
            // A concurrent delivery got here first
            return Ok(WebhookOutcome::Duplicate);
        }

        sqlx::query("UPDATE orders SET payment_status = 'completed' WHERE id = $1")
            .bind(payment.order_id)
            .execute(&mut *tx)
            .await?;

        let confirmed = sqlx::query(
            "UPDATE orders SET status = 'confirmed' WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment.order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::info!(
            "Payment {} approved for order {} (confirmed: {})",
            payment.id,
            payment.order_id,
            confirmed == 1
        );

        let restaurant_id = self
            .orders
            .restaurant_of_order(payment.order_id)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::OrderNotFound)?;

        let payload = order_event_payload(&order, restaurant_id);
        self.realtime
            .emit_to_user(order.customer_id, EventType::PaymentReceived, payload.clone())
            .await;
        self.realtime
            .emit_to_restaurant(restaurant_id, EventType::NewOrderPending, payload.clone())
            .await;

        if confirmed == 1 {
            self.realtime
                .emit_to_restaurant(restaurant_id, EventType::OrderStatusChanged, payload.clone())
                .await;
            self.realtime
                .emit_to_user(order.customer_id, EventType::OrderStatusChanged, payload)
                .await;
        }

        Ok(WebhookOutcome::Applied)
    }

    async fn apply_rejected(&self, payment: Payment) -> Result<WebhookOutcome, PaymentError> {
        if payment.status != PaymentStatus::Pending {
            return Ok(WebhookOutcome::Duplicate);
        }

        let order = self
            .orders
            .find_by_id(payment.order_id)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::OrderNotFound)?;

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("UPDATE payments SET status = 'failed' WHERE id = $1 AND status = 'pending'")
            .bind(payment.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            return Ok(WebhookOutcome::Duplicate);
        }

        sqlx::query("UPDATE orders SET payment_status = 'failed' WHERE id = $1")
            .bind(payment.order_id)
            .execute(&mut *tx)
            .await?;

        let cancelled = sqlx::query(
            "UPDATE orders SET status = 'cancelled' WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment.order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::info!(
            "Payment {} rejected for order {} (cancelled: {})",
            payment.id,
            payment.order_id,
            cancelled == 1
        );

        let restaurant_id = self
            .orders
            .restaurant_of_order(payment.order_id)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::OrderNotFound)?;

        let payload = order_event_payload(&order, restaurant_id);
        self.realtime
            .emit_to_user(order.customer_id, EventType::PaymentFailed, payload.clone())
            .await;

        if cancelled == 1 {
            self.realtime
                .emit_to_restaurant(restaurant_id, EventType::OrderCancelled, payload.clone())
                .await;
            self.realtime
                .emit_to_user(order.customer_id, EventType::OrderCancelled, payload)
                .await;
        }

        Ok(WebhookOutcome::Applied)
    }

    /// Preference failure path: payment + order payment_status go failed,
    /// order.status stays pending for a retry
    async fn mark_payment_failed(&self, order_id: i64) -> Result<(), PaymentError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payments SET status = 'failed' WHERE order_id = $1 AND status = 'pending'")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE orders SET payment_status = 'failed' WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Pull (status, provider id, external reference) out of a webhook body.
///
/// Ok(None) means "acknowledge and ignore"; Err means the payload is
/// malformed and the provider should see a 400.
fn classify(
    payload: &WebhookPayload,
) -> Result<Option<(WebhookStatus, Option<String>, Option<Uuid>)>, PaymentError> {
    if payload.event_type.as_deref() != Some("payment") {
        return Ok(None);
    }

    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| PaymentError::MalformedWebhook("payment event without data".to_string()))?;

    let status_str = data
        .status
        .as_deref()
        .ok_or_else(|| PaymentError::MalformedWebhook("payment event without status".to_string()))?;

    let status = match WebhookStatus::parse(status_str) {
        Some(status) => status,
        None => {
            tracing::warn!("Ignoring webhook with unknown status '{}'", status_str);
            return Ok(None);
        }
    };

    if data.id.is_none() && data.external_reference.is_none() {
        return Err(PaymentError::MalformedWebhook(
            "payment event carries no identifier".to_string(),
        ));
    }

    Ok(Some((status, data.id.clone(), data.external_reference)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::models::WebhookData;

    fn payload(
        event_type: Option<&str>,
        data: Option<WebhookData>,
    ) -> WebhookPayload {
        WebhookPayload {
            event_type: event_type.map(str::to_string),
            action: None,
            data,
        }
    }

    #[test]
    fn test_non_payment_events_are_ignored() {
        let result = classify(&payload(Some("plan"), None)).unwrap();
        assert!(result.is_none());
        let result = classify(&payload(None, None)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_payment_event_without_data_is_malformed() {
        assert!(classify(&payload(Some("payment"), None)).is_err());
    }

    #[test]
    fn test_payment_event_without_identifiers_is_malformed() {
        let data = WebhookData {
            id: None,
            status: Some("approved".to_string()),
            external_reference: None,
        };
        assert!(classify(&payload(Some("payment"), Some(data))).is_err());
    }

    #[test]
    fn test_unknown_status_is_ignored() {
        let data = WebhookData {
            id: Some("99".to_string()),
            status: Some("charged_back".to_string()),
            external_reference: None,
        };
        let result = classify(&payload(Some("payment"), Some(data))).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_approved_event_classifies() {
        let reference = Uuid::new_v4();
        let data = WebhookData {
            id: Some("12345".to_string()),
            status: Some("approved".to_string()),
            external_reference: Some(reference),
        };
        let (status, id, ext) = classify(&payload(Some("payment"), Some(data)))
            .unwrap()
            .unwrap();
        assert_eq!(status, WebhookStatus::Approved);
        assert_eq!(id.as_deref(), Some("12345"));
        assert_eq!(ext, Some(reference));
    }
}
