use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::{validate_latitude, validate_longitude};

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready_for_pickup" => Ok(OrderStatus::ReadyForPickup),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Mercadopago,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mercadopago => "mercadopago",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state mirrored between the order and its payment row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// Order row. Immutable after assembly except for status, payment_status,
/// delivery_driver_id and the delivery timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_id: i32,
    pub branch_id: i32,
    pub address_id: i32,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub commission_rate_snapshot: Decimal,
    pub platform_fee: Decimal,
    pub restaurant_payout: Decimal,
    pub delivery_driver_id: Option<i32>,
    pub special_instructions: Option<String>,
    pub order_placed_at: DateTime<Utc>,
    pub order_delivered_at: Option<DateTime<Utc>>,
}

/// Item snapshot copied from the cart at assembly
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub price_per_unit: Decimal,
}

/// Modifier option copy attached to an order item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItemModifier {
    pub id: i64,
    pub order_item_id: i64,
    pub modifier_option_id: i32,
    pub option_name: String,
    pub price_delta: Decimal,
}

/// Request DTO for POST /api/checkout/create-preference
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[schema(example = 3)]
    pub address_id: i32,
    /// Checkout always consumes the cart; direct item lists are not supported
    #[serde(default = "default_use_cart")]
    pub use_cart: bool,
    #[schema(example = 7)]
    pub restaurant_id: i32,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "Instructions are limited to 500 characters"))]
    pub special_instructions: Option<String>,
}

fn default_use_cart() -> bool {
    true
}

/// Request DTO for PATCH /api/restaurant/orders/{orderId}/status
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 300, message = "Reason is limited to 300 characters"))]
    pub reason: Option<String>,
}

/// Request DTO for POST /api/addresses
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 60))]
    pub label: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "validate_longitude")]
    pub longitude: f64,
}

/// Query parameters for order listings
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

/// Response DTO for checkout
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[schema(example = 412)]
    pub order_id: i64,
    #[schema(value_type = f64)]
    pub total: Decimal,
    /// Present for card payments when the gateway accepted the preference
    pub redirect_url: Option<String>,
    pub estimated_delivery_min: i64,
    pub estimated_delivery_max: i64,
}

/// Modifier copy as rendered on an order item
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemModifierResponse {
    pub modifier_option_id: i32,
    pub option_name: String,
    pub price_delta: Decimal,
}

/// Order item as rendered to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub price_per_unit: Decimal,
    pub modifiers: Vec<OrderItemModifierResponse>,
}

/// Full order view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub customer_id: i32,
    pub branch_id: i32,
    pub address_id: i32,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub delivery_driver_id: Option<i32>,
    pub special_instructions: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub order_placed_at: DateTime<Utc>,
    pub order_delivered_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("completed").is_err());
    }

    #[test]
    fn test_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"ready_for_pickup\"");
        let parsed: OrderStatus = serde_json::from_str("\"out_for_delivery\"").unwrap();
        assert_eq!(parsed, OrderStatus::OutForDelivery);
    }

}
