use sqlx::PgPool;

use crate::models::Address;
use crate::orders::error::OrderError;
use crate::orders::models::{Order, OrderItem, OrderItemModifier, OrderStatus};

/// Column list shared by every order SELECT/RETURNING
pub(crate) const ORDER_FIELDS: &str = "id, customer_id, branch_id, address_id, status, \
     payment_method, payment_status, subtotal, delivery_fee, service_fee, total, \
     commission_rate_snapshot, platform_fee, restaurant_payout, delivery_driver_id, \
     special_instructions, order_placed_at, order_delivered_at";

/// Repository for order reads and lifecycle writes
#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

impl OrdersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_FIELDS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Restaurant that owns the order's branch
    pub async fn restaurant_of_order(&self, order_id: i64) -> Result<Option<i32>, OrderError> {
        let restaurant_id: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT b.restaurant_id
            FROM orders o
            JOIN branches b ON b.id = o.branch_id
            WHERE o.id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(restaurant_id)
    }

    pub async fn find_by_customer(
        &self,
        customer_id: i32,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders WHERE customer_id = $1 AND status = $2 \
                     ORDER BY order_placed_at DESC",
                    ORDER_FIELDS
                ))
                .bind(customer_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders WHERE customer_id = $1 ORDER BY order_placed_at DESC",
                    ORDER_FIELDS
                ))
                .bind(customer_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    /// Order board for a restaurant's dashboard, newest first
    pub async fn find_by_restaurant(
        &self,
        restaurant_id: i32,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let base = format!(
            "SELECT o.{} FROM orders o JOIN branches b ON b.id = o.branch_id \
             WHERE b.restaurant_id = $1",
            ORDER_FIELDS.replace(", ", ", o.")
        );

        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, Order>(&format!(
                    "{} AND o.status = $2 ORDER BY o.order_placed_at DESC",
                    base
                ))
                .bind(restaurant_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!("{} ORDER BY o.order_placed_at DESC", base))
                    .bind(restaurant_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(orders)
    }

    pub async fn items_of(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_per_unit
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn modifiers_of(&self, order_id: i64) -> Result<Vec<OrderItemModifier>, OrderError> {
        let modifiers = sqlx::query_as::<_, OrderItemModifier>(
            r#"
            SELECT oim.id, oim.order_item_id, oim.modifier_option_id, oim.option_name, oim.price_delta
            FROM order_item_modifiers oim
            JOIN order_items oi ON oi.id = oim.order_item_id
            WHERE oi.order_id = $1
            ORDER BY oim.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(modifiers)
    }

    /// Conditional status write. Zero affected rows means another actor
    /// moved the order first; callers surface that as StaleState.
    pub async fn transition_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<u64, OrderError> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(order_id)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Administrative refund: flips order and payment rows together, gated
    /// on the order still being delivered.
    pub async fn refund(&self, order_id: i64) -> Result<u64, OrderError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'refunded', payment_status = 'refunded'
            WHERE id = $1 AND status = 'delivered'
            "#,
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            sqlx::query("UPDATE payments SET status = 'refunded' WHERE order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    pub async fn list_addresses(&self, user_id: i32) -> Result<Vec<Address>, OrderError> {
        let addresses = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, label, street, city, latitude, longitude
            FROM addresses
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }

    pub async fn insert_address(
        &self,
        user_id: i32,
        label: &str,
        street: &str,
        city: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Address, OrderError> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            INSERT INTO addresses (user_id, label, street, city, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, label, street, city, latitude, longitude
            "#,
        )
        .bind(user_id)
        .bind(label)
        .bind(street)
        .bind(city)
        .bind(latitude)
        .bind(longitude)
        .fetch_one(&self.pool)
        .await?;

        Ok(address)
    }
}
