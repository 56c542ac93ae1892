use sqlx::PgPool;
use uuid::Uuid;

use crate::payments::error::PaymentError;
use crate::payments::models::Payment;

const PAYMENT_FIELDS: &str =
    "id, order_id, amount, provider, provider_payment_id, external_reference, status, created_at";

/// Repository for payment lookups. Transactional state changes live in the
/// coordinator because they always span the payment and its order.
#[derive(Clone)]
pub struct PaymentsRepository {
    pool: PgPool,
}

impl PaymentsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locate the payment a webhook refers to, by provider payment id or by
    /// the external reference minted at assembly.
    pub async fn find_by_webhook_keys(
        &self,
        provider_payment_id: Option<&str>,
        external_reference: Option<Uuid>,
    ) -> Result<Option<Payment>, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {}
            FROM payments
            WHERE ($1::text IS NOT NULL AND provider_payment_id = $1)
               OR ($2::uuid IS NOT NULL AND external_reference = $2)
            LIMIT 1
            "#,
            PAYMENT_FIELDS
        ))
        .bind(provider_payment_id)
        .bind(external_reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Store the gateway's intent id once the preference is accepted
    pub async fn set_provider_payment_id(
        &self,
        order_id: i64,
        provider_payment_id: &str,
    ) -> Result<(), PaymentError> {
        sqlx::query("UPDATE payments SET provider_payment_id = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(provider_payment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
