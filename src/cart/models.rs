use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::validate_item_quantity;

/// Cart row: one per (user, restaurant), created lazily on first add
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub id: i32,
    pub user_id: i32,
    pub restaurant_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Cart line. `price_at_add` freezes the unit price (base + modifier
/// deltas) at the moment the line entered the cart.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: i32,
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price_at_add: Decimal,
}

/// One selected modifier option attached to a cart item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItemModifier {
    pub id: i32,
    pub cart_item_id: i32,
    pub modifier_option_id: i32,
}

/// Request DTO for POST /api/cart/add
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[schema(example = 12)]
    pub product_id: i32,
    #[validate(custom = "validate_item_quantity")]
    #[schema(example = 2, minimum = 1, maximum = 99)]
    pub quantity: i32,
    #[serde(default)]
    pub modifier_option_ids: Vec<i32>,
}

/// Request DTO for PUT /api/cart/update/{itemId}; quantity 0 removes
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = 99, message = "Quantity must be between 0 and 99"))]
    #[schema(example = 3)]
    pub quantity: i32,
}

/// Query parameters for DELETE /api/cart/clear
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearCartQuery {
    pub restaurant_id: Option<i32>,
}

/// Modifier option as rendered inside a cart line
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartModifierView {
    pub modifier_option_id: i32,
    pub name: String,
    #[schema(value_type = f64)]
    pub price_delta: Decimal,
}

/// Cart line as returned to the client
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub price_at_add: Decimal,
    #[schema(value_type = f64)]
    pub line_total: Decimal,
    pub modifiers: Vec<CartModifierView>,
}

/// One restaurant's cart within the grouped listing
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantCartView {
    pub cart_id: i32,
    pub restaurant_id: i32,
    pub restaurant_name: String,
    pub items: Vec<CartItemView>,
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
    pub item_count: i64,
}

/// Response DTO for GET /api/cart
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartListView {
    pub carts: Vec<RestaurantCartView>,
}
