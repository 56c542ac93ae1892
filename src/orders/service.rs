use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{evaluate, Action, AuthenticatedUser, OrderScope, Target};
use crate::cart::repository::CatalogRepository;
use crate::dispatch::geo::haversine_km;
use crate::dispatch::DispatchService;
use crate::models::{Address, Branch, BranchSchedule, Product, Restaurant};
use crate::orders::error::OrderError;
use crate::orders::models::{
    CheckoutResponse, CreateAddressRequest, Order, OrderItemModifierResponse, OrderItemResponse,
    OrderResponse, OrderStatus, PaymentMethod, PlaceOrderRequest, UpdateStatusRequest,
};
use crate::orders::repository::{OrdersRepository, ORDER_FIELDS};
use crate::orders::status_machine::StatusMachine;
use crate::payments::PaymentService;
use crate::pricing::routing::resolve_route;
use crate::pricing::{round2, CartLine, DistanceProvider, PricingEngine, PricingError};
use crate::realtime::{EventType, RealtimeBus};

/// Allowed drift between a cart line's frozen price and its recomputed
/// current price before checkout is rejected
const PRICE_DRIFT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Cart line joined with its selected option, as read inside the assembly
/// transaction
#[derive(Debug, sqlx::FromRow)]
struct TxCartItemRow {
    id: i32,
    product_id: i32,
    quantity: i32,
    price_at_add: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct TxModifierRow {
    cart_item_id: i32,
    option_id: i32,
    option_name: String,
    price_delta: Decimal,
    is_active: bool,
}

/// Service for order assembly and lifecycle transitions
#[derive(Clone)]
pub struct OrderService {
    pool: sqlx::PgPool,
    catalog: CatalogRepository,
    orders: OrdersRepository,
    distance: Arc<dyn DistanceProvider>,
    payments: PaymentService,
    dispatch: DispatchService,
    realtime: Arc<RealtimeBus>,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: sqlx::PgPool,
        catalog: CatalogRepository,
        orders: OrdersRepository,
        distance: Arc<dyn DistanceProvider>,
        payments: PaymentService,
        dispatch: DispatchService,
        realtime: Arc<RealtimeBus>,
    ) -> Self {
        Self {
            pool,
            catalog,
            orders,
            distance,
            payments,
            dispatch,
            realtime,
        }
    }

    /// Assemble the user's cart for a restaurant into a persisted order.
    ///
    /// Runs as one database transaction covering cart load, branch and
    /// schedule validation, per-item revalidation, pricing, and the order /
    /// items / payment inserts plus the cart delete. Realtime events and the
    /// gateway preference request happen strictly after commit.
    pub async fn place_order(
        &self,
        user: &AuthenticatedUser,
        request: PlaceOrderRequest,
    ) -> Result<CheckoutResponse, OrderError> {
        evaluate(
            user,
            Action::PlaceOrder,
            Target::User {
                user_id: user.user_id,
            },
        )?;

        if !request.use_cart {
            return Err(OrderError::ValidationError(
                "Checkout without a cart is not supported".to_string(),
            ));
        }

        let address = self
            .catalog
            .find_address(request.address_id)
            .await
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?
            .filter(|a| a.user_id == user.user_id)
            .ok_or(OrderError::AddressNotFound)?;

        let mut tx = self.pool.begin().await?;

        // Cart and lines
        let cart_id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 AND restaurant_id = $2")
                .bind(user.user_id)
                .bind(request.restaurant_id)
                .fetch_optional(&mut *tx)
                .await?;
        let cart_id = cart_id.ok_or(OrderError::EmptyCart)?;

        let items = sqlx::query_as::<_, TxCartItemRow>(
            "SELECT id, product_id, quantity, price_at_add FROM cart_items \
             WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let modifier_rows = sqlx::query_as::<_, TxModifierRow>(
            r#"
            SELECT cim.cart_item_id, mo.id AS option_id, mo.name AS option_name,
                   mo.price_delta, mo.is_active
            FROM cart_item_modifiers cim
            JOIN cart_items ci ON ci.id = cim.cart_item_id
            JOIN modifier_options mo ON mo.id = cim.modifier_option_id
            WHERE ci.cart_id = $1
            ORDER BY cim.id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        let restaurant = sqlx::query_as::<_, Restaurant>(
            "SELECT id, name, commission_rate, status FROM restaurants WHERE id = $1",
        )
        .bind(request.restaurant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(OrderError::BranchNotFound)?;

        if !restaurant.is_active() {
            return Err(OrderError::BranchClosed);
        }

        // Branch resolution and schedule window
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, restaurant_id, name, latitude, longitude, uses_platform_drivers,
                   delivery_fee_base, estimated_delivery_min, estimated_delivery_max,
                   delivery_radius_km, status
            FROM branches
            WHERE restaurant_id = $1 AND status = 'active'
            ORDER BY id
            "#,
        )
        .bind(request.restaurant_id)
        .fetch_all(&mut *tx)
        .await?;

        let branch = nearest_branch(&branches, &address).ok_or(OrderError::BranchNotFound)?;

        let now = Utc::now();
        let day_of_week = now.weekday().num_days_from_sunday() as i16;
        let schedule = sqlx::query_as::<_, BranchSchedule>(
            r#"
            SELECT id, branch_id, day_of_week, opening_time, closing_time, is_closed
            FROM branch_schedules
            WHERE branch_id = $1 AND day_of_week = $2
            "#,
        )
        .bind(branch.id)
        .bind(day_of_week)
        .fetch_optional(&mut *tx)
        .await?;

        let open = schedule
            .map(|s| s.is_open_at(now.time()))
            .unwrap_or(false);
        if !open {
            return Err(OrderError::BranchClosed);
        }

        // Per-item revalidation and price-drift check
        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, restaurant_id, subcategory_id, name, description, price, is_available \
             FROM products WHERE id = ANY($1)",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;
        let product_index: HashMap<i32, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut modifiers_by_item: HashMap<i32, Vec<&TxModifierRow>> = HashMap::new();
        for row in &modifier_rows {
            modifiers_by_item.entry(row.cart_item_id).or_default().push(row);
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            // A cart row whose product vanished from the catalog is a line
            // with no match, not merely an unavailable one
            let product = product_index
                .get(&item.product_id)
                .copied()
                .ok_or(PricingError::InvalidItem {
                    product_id: item.product_id,
                })
                .map_err(pricing_to_order_error)?;

            if !product.is_available || product.restaurant_id != request.restaurant_id {
                return Err(OrderError::ProductUnavailable(product.id));
            }

            let item_modifiers = modifiers_by_item
                .get(&item.id)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);

            if item_modifiers.iter().any(|m| !m.is_active) {
                return Err(OrderError::ProductUnavailable(product.id));
            }

            let line = CartLine {
                product_id: product.id,
                base_price: product.price,
                modifier_deltas: item_modifiers.iter().map(|m| m.price_delta).collect(),
                quantity: item.quantity,
            };
            let current_unit = line.unit_price().map_err(pricing_to_order_error)?;

            if (current_unit - item.price_at_add).abs() > PRICE_DRIFT_TOLERANCE {
                return Err(OrderError::PriceDrift {
                    product_id: product.id,
                    current_price: current_unit,
                });
            }

            lines.push(line);
        }

        // Route and money math. A routing failure degrades to the
        // deterministic fallback, never aborting checkout.
        let route = resolve_route(self.distance.as_ref(), branch.point(), address.point()).await;
        let pricing = PricingEngine::price_cart(&lines, &route).map_err(pricing_to_order_error)?;

        let rate = restaurant.commission_rate;
        let platform_fee = round2(pricing.subtotal * rate / Decimal::from(100));
        let restaurant_payout =
            round2(pricing.subtotal - pricing.subtotal * rate / Decimal::from(100));

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (customer_id, branch_id, address_id, status, payment_method,
                                payment_status, subtotal, delivery_fee, service_fee, total,
                                commission_rate_snapshot, platform_fee, restaurant_payout,
                                special_instructions)
            VALUES ($1, $2, $3, 'pending', $4, 'pending', $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            ORDER_FIELDS
        ))
        .bind(user.user_id)
        .bind(branch.id)
        .bind(address.id)
        .bind(request.payment_method)
        .bind(pricing.subtotal)
        .bind(pricing.delivery_fee)
        .bind(pricing.service_fee)
        .bind(pricing.total)
        .bind(rate)
        .bind(platform_fee)
        .bind(restaurant_payout)
        .bind(&request.special_instructions)
        .fetch_one(&mut *tx)
        .await?;

        for (item, line) in items.iter().zip(&lines) {
            let product = product_index[&item.product_id];
            let unit_price = line.unit_price().map_err(pricing_to_order_error)?;

            let order_item_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price_per_unit)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(order.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(item.quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;

            for modifier in modifiers_by_item.get(&item.id).map(|v| v.as_slice()).unwrap_or(&[]) {
                sqlx::query(
                    r#"
                    INSERT INTO order_item_modifiers
                        (order_item_id, modifier_option_id, option_name, price_delta)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(order_item_id)
                .bind(modifier.option_id)
                .bind(&modifier.option_name)
                .bind(modifier.price_delta)
                .execute(&mut *tx)
                .await?;
            }
        }

        let external_reference = Uuid::new_v4();
        let provider_payment_id = match request.payment_method {
            PaymentMethod::Cash => Some(format!("cash_{}_{}", order.id, Uuid::new_v4().simple())),
            PaymentMethod::Mercadopago => None,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (order_id, amount, provider, provider_payment_id,
                                  external_reference, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            "#,
        )
        .bind(order.id)
        .bind(order.total)
        .bind(request.payment_method.as_str())
        .bind(&provider_payment_id)
        .bind(external_reference)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Order {} placed by user {} at branch {} for {}",
            order.id,
            user.user_id,
            branch.id,
            order.total
        );

        // Post-commit effects only: a rolled-back transaction must never
        // have leaked an event or a gateway call.
        self.realtime
            .emit_to_restaurant(
                restaurant.id,
                EventType::OrderPlaced,
                order_event_payload(&order, restaurant.id),
            )
            .await;

        let redirect_url = match request.payment_method {
            PaymentMethod::Mercadopago => {
                match self.payments.create_preference(&order, external_reference).await {
                    Ok(preference) => Some(preference.redirect_url),
                    Err(e) => {
                        tracing::warn!("Preference creation failed for order {}: {}", order.id, e);
                        None
                    }
                }
            }
            PaymentMethod::Cash => None,
        };

        let window =
            PricingEngine::estimate_delivery_window(Some(route.duration_min), items.len());

        Ok(CheckoutResponse {
            order_id: order.id,
            total: order.total,
            redirect_url,
            estimated_delivery_min: window.min_minutes,
            estimated_delivery_max: window.max_minutes,
        })
    }

    /// Restaurant-side (and administrative) status transition.
    ///
    /// Validates the edge against the transition table, gates it on the
    /// caller's role bindings, then persists with a conditional update so a
    /// concurrent writer surfaces as StaleState instead of a double apply.
    pub async fn update_status(
        &self,
        user: &AuthenticatedUser,
        order_id: i64,
        request: UpdateStatusRequest,
    ) -> Result<Order, OrderError> {
        let order = self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
        let restaurant_id = self
            .orders
            .restaurant_of_order(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let from = order.status;
        let to = request.status;

        if !StatusMachine::is_valid_transition(from, to) {
            return Err(OrderError::IllegalTransition { from, to });
        }

        evaluate(
            user,
            Action::TransitionOrder { from, to },
            Target::Order(order_scope(&order, restaurant_id)),
        )?;

        let rows = if to == OrderStatus::Refunded {
            self.orders.refund(order_id).await?
        } else {
            self.orders.transition_status(order_id, from, to).await?
        };

        if rows == 0 {
            return Err(OrderError::StaleState);
        }

        let updated = self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;

        self.emit_status_events(&updated, restaurant_id, request.reason.as_deref())
            .await;

        if to == OrderStatus::ReadyForPickup {
            // Dispatch computes eligibility and fans out after this commit;
            // it must never run inside the transition path itself.
            let dispatch = self.dispatch.clone();
            let ready = updated.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatch.announce(&ready).await {
                    tracing::error!("Dispatch announce failed for order {}: {}", ready.id, e);
                }
            });
        }

        Ok(updated)
    }

    /// Customer cancel, only while the order is still pending
    pub async fn cancel_own_order(
        &self,
        user: &AuthenticatedUser,
        order_id: i64,
    ) -> Result<Order, OrderError> {
        let order = self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
        let restaurant_id = self
            .orders
            .restaurant_of_order(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        evaluate(
            user,
            Action::CancelOwnOrder,
            Target::Order(order_scope(&order, restaurant_id)),
        )?;

        if order.status != OrderStatus::Pending {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let rows = self
            .orders
            .transition_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?;
        if rows == 0 {
            return Err(OrderError::StaleState);
        }

        let updated = self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
        self.emit_status_events(&updated, restaurant_id, Some("cancelled by customer"))
            .await;

        Ok(updated)
    }

    /// An order as seen by its customer
    pub async fn get_own_order(
        &self,
        user: &AuthenticatedUser,
        order_id: i64,
    ) -> Result<OrderResponse, OrderError> {
        let order = self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
        let restaurant_id = self
            .orders
            .restaurant_of_order(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        evaluate(
            user,
            Action::ViewOwnOrder,
            Target::Order(order_scope(&order, restaurant_id)),
        )?;

        self.build_order_response(order).await
    }

    pub async fn list_own_orders(
        &self,
        user: &AuthenticatedUser,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderResponse>, OrderError> {
        evaluate(
            user,
            Action::ViewOwnOrder,
            Target::Order(OrderScope {
                restaurant_id: 0,
                branch_id: 0,
                customer_id: user.user_id,
                delivery_driver_id: None,
            }),
        )?;

        let orders = self.orders.find_by_customer(user.user_id, status).await?;
        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            responses.push(self.build_order_response(order).await?);
        }

        Ok(responses)
    }

    /// Order board for a restaurant dashboard
    pub async fn list_restaurant_orders(
        &self,
        user: &AuthenticatedUser,
        restaurant_id: i32,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderResponse>, OrderError> {
        evaluate(
            user,
            Action::ViewRestaurantOrders,
            Target::Restaurant { restaurant_id },
        )?;

        let orders = self.orders.find_by_restaurant(restaurant_id, status).await?;
        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            responses.push(self.build_order_response(order).await?);
        }

        Ok(responses)
    }

    pub async fn list_addresses(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<Vec<Address>, OrderError> {
        evaluate(
            user,
            Action::ManageAddresses,
            Target::User {
                user_id: user.user_id,
            },
        )?;

        self.orders.list_addresses(user.user_id).await
    }

    pub async fn create_address(
        &self,
        user: &AuthenticatedUser,
        request: CreateAddressRequest,
    ) -> Result<Address, OrderError> {
        evaluate(
            user,
            Action::ManageAddresses,
            Target::User {
                user_id: user.user_id,
            },
        )?;

        self.orders
            .insert_address(
                user.user_id,
                &request.label,
                &request.street,
                &request.city,
                request.latitude,
                request.longitude,
            )
            .await
    }

    async fn build_order_response(&self, order: Order) -> Result<OrderResponse, OrderError> {
        let items = self.orders.items_of(order.id).await?;
        let modifiers = self.orders.modifiers_of(order.id).await?;

        let mut modifiers_by_item: HashMap<i64, Vec<OrderItemModifierResponse>> = HashMap::new();
        for modifier in modifiers {
            modifiers_by_item
                .entry(modifier.order_item_id)
                .or_default()
                .push(OrderItemModifierResponse {
                    modifier_option_id: modifier.modifier_option_id,
                    option_name: modifier.option_name,
                    price_delta: modifier.price_delta,
                });
        }

        let item_responses = items
            .into_iter()
            .map(|item| OrderItemResponse {
                modifiers: modifiers_by_item.remove(&item.id).unwrap_or_default(),
                id: item.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                price_per_unit: item.price_per_unit,
            })
            .collect();

        Ok(OrderResponse {
            id: order.id,
            customer_id: order.customer_id,
            branch_id: order.branch_id,
            address_id: order.address_id,
            status: order.status,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            subtotal: order.subtotal,
            delivery_fee: order.delivery_fee,
            service_fee: order.service_fee,
            total: order.total,
            delivery_driver_id: order.delivery_driver_id,
            special_instructions: order.special_instructions,
            items: item_responses,
            order_placed_at: order.order_placed_at,
            order_delivered_at: order.order_delivered_at,
        })
    }

    async fn emit_status_events(&self, order: &Order, restaurant_id: i32, reason: Option<&str>) {
        let mut payload = order_event_payload(order, restaurant_id);
        if let Some(reason) = reason {
            payload["reason"] = serde_json::json!(reason);
        }

        self.realtime
            .emit_to_restaurant(restaurant_id, EventType::OrderStatusChanged, payload.clone())
            .await;
        self.realtime
            .emit_to_user(order.customer_id, EventType::OrderStatusChanged, payload.clone())
            .await;

        if order.status == OrderStatus::Cancelled {
            self.realtime
                .emit_to_restaurant(restaurant_id, EventType::OrderCancelled, payload.clone())
                .await;
            self.realtime
                .emit_to_user(order.customer_id, EventType::OrderCancelled, payload)
                .await;
        }
    }
}

/// The active branch closest to the delivery address
fn nearest_branch<'a>(branches: &'a [Branch], address: &Address) -> Option<&'a Branch> {
    branches.iter().min_by(|a, b| {
        let da = haversine_km(a.point(), address.point());
        let db = haversine_km(b.point(), address.point());
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

pub(crate) fn order_scope(order: &Order, restaurant_id: i32) -> OrderScope {
    OrderScope {
        restaurant_id,
        branch_id: order.branch_id,
        customer_id: order.customer_id,
        delivery_driver_id: order.delivery_driver_id,
    }
}

pub(crate) fn order_event_payload(order: &Order, restaurant_id: i32) -> serde_json::Value {
    serde_json::json!({
        "orderId": order.id,
        "restaurantId": restaurant_id,
        "branchId": order.branch_id,
        "customerId": order.customer_id,
        "status": order.status,
        "paymentMethod": order.payment_method,
        "paymentStatus": order.payment_status,
        "total": order.total,
    })
}

fn pricing_to_order_error(e: PricingError) -> OrderError {
    match e {
        PricingError::InvalidItem { product_id } => OrderError::ProductUnavailable(product_id),
        PricingError::NegativePrice { .. } => OrderError::ValidationError(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn branch_at(id: i32, latitude: f64, longitude: f64) -> Branch {
        Branch {
            id,
            restaurant_id: 1,
            name: format!("Branch {}", id),
            latitude,
            longitude,
            uses_platform_drivers: true,
            delivery_fee_base: dec!(15),
            estimated_delivery_min: 30,
            estimated_delivery_max: 45,
            delivery_radius_km: dec!(10),
            status: "active".to_string(),
        }
    }

    fn address_at(latitude: f64, longitude: f64) -> Address {
        Address {
            id: 1,
            user_id: 1,
            label: "Home".to_string(),
            street: "Calle 1".to_string(),
            city: "CDMX".to_string(),
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_nearest_branch_picks_closest() {
        let branches = vec![
            branch_at(1, 19.40, -99.10),
            branch_at(2, 19.43, -99.13),
            branch_at(3, 19.50, -99.20),
        ];
        let address = address_at(19.432, -99.133);
        assert_eq!(nearest_branch(&branches, &address).unwrap().id, 2);
    }

    #[test]
    fn test_nearest_branch_empty() {
        let address = address_at(19.43, -99.13);
        assert!(nearest_branch(&[], &address).is_none());
    }

    #[test]
    fn test_commission_snapshot_math() {
        // Scenario: subtotal 165.00 at 12.50% commission
        let subtotal = dec!(165.00);
        let rate = dec!(12.50);
        let platform_fee = round2(subtotal * rate / Decimal::from(100));
        let payout = round2(subtotal - subtotal * rate / Decimal::from(100));
        assert_eq!(platform_fee, dec!(20.63));
        assert_eq!(payout, dec!(144.38));
    }

    #[test]
    fn test_price_drift_tolerance_is_one_cent() {
        assert_eq!(PRICE_DRIFT_TOLERANCE, dec!(0.01));
        let frozen = dec!(100.00);
        assert!((dec!(100.01) - frozen).abs() <= PRICE_DRIFT_TOLERANCE);
        assert!((dec!(120.00) - frozen).abs() > PRICE_DRIFT_TOLERANCE);
    }

    #[test]
    fn test_vanished_product_rejects_checkout() {
        let err = pricing_to_order_error(PricingError::InvalidItem { product_id: 7 });
        assert!(matches!(err, OrderError::ProductUnavailable(7)));

        let err = pricing_to_order_error(PricingError::NegativePrice { product_id: 7 });
        assert!(matches!(err, OrderError::ValidationError(_)));
    }
}
