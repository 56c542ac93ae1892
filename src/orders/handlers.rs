// HTTP handlers for checkout, order lifecycle, and addresses

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::models::Address;
use crate::orders::{
    CheckoutResponse, CreateAddressRequest, OrderError, OrderListQuery, OrderResponse,
    OrderStatus, PlaceOrderRequest, UpdateStatusRequest,
};
use crate::response::ApiResponse;

/// Handler for POST /api/checkout/create-preference
/// Assembles the cart into an order and, for card payments, requests a
/// payment preference from the gateway
#[utoipa::path(
    post,
    path = "/api/checkout/create-preference",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CheckoutResponse),
        (status = 400, description = "Empty cart, closed branch, or unavailable product"),
        (status = 409, description = "Price drift since add-to-cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn checkout_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let checkout = state.order_service.place_order(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order placed", checkout),
    ))
}

/// Handler for PATCH /api/restaurant/orders/{orderId}/status
/// Restaurant-side (and administrative) state transitions
pub async fn update_order_status_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderStatusView>>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state
        .order_service
        .update_status(&user, order_id, request)
        .await?;

    Ok(ApiResponse::ok(
        "Order status updated",
        OrderStatusView {
            order_id: order.id,
            status: order.status,
        },
    ))
}

/// Minimal status payload returned by transition endpoints
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    pub order_id: i64,
    pub status: OrderStatus,
}

/// Query parameters for the restaurant order board
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantOrdersQuery {
    pub restaurant_id: i32,
    pub status: Option<OrderStatus>,
}

/// Handler for GET /api/restaurant/orders
pub async fn list_restaurant_orders_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<RestaurantOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, OrderError> {
    let orders = state
        .order_service
        .list_restaurant_orders(&user, query.restaurant_id, query.status)
        .await?;

    Ok(ApiResponse::ok("Orders retrieved", orders))
}

/// Handler for GET /api/orders
/// The authenticated customer's order history
pub async fn list_own_orders_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, OrderError> {
    let orders = state
        .order_service
        .list_own_orders(&user, query.status)
        .await?;

    Ok(ApiResponse::ok("Orders retrieved", orders))
}

/// Handler for GET /api/orders/{orderId}
pub async fn get_own_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<OrderResponse>>, OrderError> {
    let order = state.order_service.get_own_order(&user, order_id).await?;

    Ok(ApiResponse::ok("Order retrieved", order))
}

/// Handler for POST /api/orders/{orderId}/cancel
/// Customer cancel, valid only while the order is pending
pub async fn cancel_own_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<OrderStatusView>>, OrderError> {
    let order = state
        .order_service
        .cancel_own_order(&user, order_id)
        .await?;

    Ok(ApiResponse::ok(
        "Order cancelled",
        OrderStatusView {
            order_id: order.id,
            status: order.status,
        },
    ))
}

/// Handler for GET /api/addresses
pub async fn list_addresses_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<Address>>>, OrderError> {
    let addresses = state.order_service.list_addresses(&user).await?;

    Ok(ApiResponse::ok("Addresses retrieved", addresses))
}

/// Handler for POST /api/addresses
pub async fn create_address_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Address>>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let address = state.order_service.create_address(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Address created", address),
    ))
}
