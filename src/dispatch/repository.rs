use sqlx::PgPool;

use crate::auth::DriverProfile;
use crate::dispatch::error::DispatchError;
use crate::dispatch::models::{AvailableOrderView, DriverStatus, EligibleDriver};
use crate::models::Branch;
use crate::orders::PaymentMethod;

/// SQL rendering of the Haversine distance (km) between a driver's fix and
/// a branch point supplied as bind parameters
const DRIVER_DISTANCE_KM: &str = "2 * 6371 * asin(sqrt( \
     power(sin(radians(($3 - dp.current_lat) / 2)), 2) \
     + cos(radians(dp.current_lat)) * cos(radians($3)) \
     * power(sin(radians(($4 - dp.current_lng) / 2)), 2)))";

/// Repository for driver eligibility, the claim/deliver conditional
/// updates, and courier profile writes
#[derive(Clone)]
pub struct DispatchRepository {
    pool: PgPool,
}

impl DispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Online platform drivers with a known position. Radius filtering
    /// happens in the caller against the branch point.
    pub async fn online_platform_drivers(&self) -> Result<Vec<EligibleDriver>, DispatchError> {
        let drivers = sqlx::query_as::<_, EligibleDriver>(
            r#"
            SELECT dp.user_id, dp.current_lat, dp.current_lng
            FROM driver_profiles dp
            JOIN user_role_assignments ra ON ra.user_id = dp.user_id
            JOIN roles r ON r.id = ra.role_id
            WHERE r.name = 'driver_platform'
              AND dp.status = 'online'
              AND dp.current_lat IS NOT NULL
              AND dp.current_lng IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drivers)
    }

    /// Online drivers employed by the restaurant; no distance requirement
    pub async fn online_restaurant_drivers(
        &self,
        restaurant_id: i32,
    ) -> Result<Vec<EligibleDriver>, DispatchError> {
        let drivers = sqlx::query_as::<_, EligibleDriver>(
            r#"
            SELECT dp.user_id, dp.current_lat, dp.current_lng
            FROM driver_profiles dp
            JOIN user_role_assignments ra ON ra.user_id = dp.user_id
            JOIN roles r ON r.id = ra.role_id
            WHERE r.name = 'driver_restaurant'
              AND ra.restaurant_id = $1
              AND dp.status = 'online'
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(drivers)
    }

    /// First-claim-wins write.
    ///
    /// One conditional UPDATE assigns the driver iff the order is still
    /// ready and unassigned AND the driver satisfies the eligibility
    /// predicate at this instant. Under any number of concurrent claims at
    /// most one statement can affect a row.
    pub async fn claim(
        &self,
        order_id: i64,
        driver_id: i32,
        branch: &Branch,
        radius_km: f64,
    ) -> Result<u64, DispatchError> {
        let result = if branch.uses_platform_drivers {
            sqlx::query(&format!(
                r#"
                UPDATE orders
                SET delivery_driver_id = $1, status = 'out_for_delivery'
                WHERE id = $2
                  AND status = 'ready_for_pickup'
                  AND delivery_driver_id IS NULL
                  AND EXISTS (
                      SELECT 1
                      FROM driver_profiles dp
                      JOIN user_role_assignments ra ON ra.user_id = dp.user_id
                      JOIN roles r ON r.id = ra.role_id
                      WHERE dp.user_id = $1
                        AND r.name = 'driver_platform'
                        AND dp.status = 'online'
                        AND dp.current_lat IS NOT NULL
                        AND dp.current_lng IS NOT NULL
                        AND {} <= $5
                  )
                "#,
                DRIVER_DISTANCE_KM
            ))
            .bind(driver_id)
            .bind(order_id)
            .bind(branch.latitude)
            .bind(branch.longitude)
            .bind(radius_km)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET delivery_driver_id = $1, status = 'out_for_delivery'
                WHERE id = $2
                  AND status = 'ready_for_pickup'
                  AND delivery_driver_id IS NULL
                  AND EXISTS (
                      SELECT 1
                      FROM driver_profiles dp
                      JOIN user_role_assignments ra ON ra.user_id = dp.user_id
                      JOIN roles r ON r.id = ra.role_id
                      WHERE dp.user_id = $1
                        AND r.name = 'driver_restaurant'
                        AND ra.restaurant_id = $3
                        AND dp.status = 'online'
                  )
                "#,
            )
            .bind(driver_id)
            .bind(order_id)
            .bind(branch.restaurant_id)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected())
    }

    /// Delivery completion, gated on the caller being the assigned driver.
    /// Cash orders settle their payment in the same transaction.
    pub async fn mark_delivered(
        &self,
        order_id: i64,
        driver_id: i32,
    ) -> Result<u64, DispatchError> {
        let mut tx = self.pool.begin().await?;

        let delivered: Option<(PaymentMethod,)> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = 'delivered',
                order_delivered_at = NOW(),
                payment_status = CASE WHEN payment_method = 'cash'
                                      THEN 'completed' ELSE payment_status END
            WHERE id = $1
              AND delivery_driver_id = $2
              AND status = 'out_for_delivery'
            RETURNING payment_method
            "#,
        )
        .bind(order_id)
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let rows = match delivered {
            Some((PaymentMethod::Cash,)) => {
                sqlx::query(
                    "UPDATE payments SET status = 'completed' WHERE order_id = $1 AND status = 'pending'",
                )
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
                1
            }
            Some(_) => 1,
            None => 0,
        };

        tx.commit().await?;

        Ok(rows)
    }

    /// Ready, unassigned orders the driver could claim right now
    pub async fn available_orders_for_driver(
        &self,
        driver_id: i32,
        radius_km: f64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AvailableOrderView>, DispatchError> {
        let orders = sqlx::query_as::<_, AvailableOrderView>(
            r#"
            SELECT o.id AS order_id, b.id AS branch_id, b.name AS branch_name,
                   b.latitude AS pickup_lat, b.longitude AS pickup_lng,
                   a.latitude AS dropoff_lat, a.longitude AS dropoff_lng,
                   o.total, o.payment_method, o.order_placed_at
            FROM orders o
            JOIN branches b ON b.id = o.branch_id
            JOIN addresses a ON a.id = o.address_id
            WHERE o.status = 'ready_for_pickup'
              AND o.delivery_driver_id IS NULL
              AND (
                  (b.uses_platform_drivers AND EXISTS (
                      SELECT 1
                      FROM driver_profiles dp
                      JOIN user_role_assignments ra ON ra.user_id = dp.user_id
                      JOIN roles r ON r.id = ra.role_id
                      WHERE dp.user_id = $1
                        AND r.name = 'driver_platform'
                        AND dp.status = 'online'
                        AND dp.current_lat IS NOT NULL
                        AND dp.current_lng IS NOT NULL
                        AND 2 * 6371 * asin(sqrt(
                              power(sin(radians((b.latitude - dp.current_lat) / 2)), 2)
                              + cos(radians(dp.current_lat)) * cos(radians(b.latitude))
                              * power(sin(radians((b.longitude - dp.current_lng) / 2)), 2)
                            )) <= $2
                  ))
                  OR ((NOT b.uses_platform_drivers) AND EXISTS (
                      SELECT 1
                      FROM driver_profiles dp
                      JOIN user_role_assignments ra ON ra.user_id = dp.user_id
                      JOIN roles r ON r.id = ra.role_id
                      WHERE dp.user_id = $1
                        AND r.name = 'driver_restaurant'
                        AND ra.restaurant_id = b.restaurant_id
                        AND dp.status = 'online'
                  ))
              )
            ORDER BY o.order_placed_at ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(driver_id)
        .bind(radius_km)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn find_profile(&self, user_id: i32) -> Result<Option<DriverProfile>, DispatchError> {
        let profile = sqlx::query_as::<_, DriverProfile>(
            r#"
            SELECT user_id, vehicle_type, license_plate, status,
                   current_lat, current_lng, last_seen_at, kyc_status
            FROM driver_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Status changes affect future eligibility only; existing assignments
    /// are never touched here
    pub async fn set_status(
        &self,
        user_id: i32,
        status: DriverStatus,
    ) -> Result<u64, DispatchError> {
        let result = sqlx::query(
            "UPDATE driver_profiles SET status = $2, last_seen_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_location(
        &self,
        user_id: i32,
        latitude: f64,
        longitude: f64,
    ) -> Result<u64, DispatchError> {
        let result = sqlx::query(
            r#"
            UPDATE driver_profiles
            SET current_lat = $2, current_lng = $3, last_seen_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(latitude)
        .bind(longitude)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
