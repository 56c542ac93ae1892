// HTTP handlers for the driver surface

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::dispatch::error::DispatchError;
use crate::dispatch::models::{
    AvailableOrderView, AvailableOrdersQuery, UpdateDriverStatusRequest, UpdateLocationRequest,
};
use crate::orders::OrderStatus;
use crate::response::ApiResponse;

/// Claim/complete responses carry the minimal order state
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimView {
    pub order_id: i64,
    pub status: OrderStatus,
    pub delivery_driver_id: Option<i32>,
}

/// Handler for GET /api/driver/orders/available
pub async fn available_orders_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AvailableOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<AvailableOrderView>>>, DispatchError> {
    let (page, limit) = query.normalize();
    let orders = state
        .dispatch_service
        .available_orders(&user, page, limit)
        .await?;

    Ok(ApiResponse::ok("Available orders retrieved", orders))
}

/// Handler for PATCH /api/driver/orders/{orderId}/accept
/// First claim wins; losers receive 409 ORDER_ALREADY_TAKEN
pub async fn claim_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<ClaimView>>, DispatchError> {
    let order = state.dispatch_service.claim(&user, order_id).await?;

    Ok(ApiResponse::ok(
        "Order claimed",
        ClaimView {
            order_id: order.id,
            status: order.status,
            delivery_driver_id: order.delivery_driver_id,
        },
    ))
}

/// Handler for PATCH /api/driver/orders/{orderId}/complete
pub async fn complete_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<ClaimView>>, DispatchError> {
    let order = state.dispatch_service.complete(&user, order_id).await?;

    Ok(ApiResponse::ok(
        "Order delivered",
        ClaimView {
            order_id: order.id,
            status: order.status,
            delivery_driver_id: order.delivery_driver_id,
        },
    ))
}

/// Handler for GET /api/driver/profile
pub async fn driver_profile_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<crate::auth::DriverProfile>>, DispatchError> {
    let profile = state.dispatch_service.profile(&user).await?;

    Ok(ApiResponse::ok("Driver profile retrieved", profile))
}

/// Handler for PATCH /api/driver/status
pub async fn update_driver_status_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateDriverStatusRequest>,
) -> Result<Json<ApiResponse<()>>, DispatchError> {
    state
        .dispatch_service
        .set_status(&user, request.status)
        .await?;

    Ok(ApiResponse::message("Driver status updated"))
}

/// Handler for PATCH /api/driver/location
pub async fn update_driver_location_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<ApiResponse<()>>, DispatchError> {
    request
        .validate()
        .map_err(|e| DispatchError::ValidationError(e.to_string()))?;

    state
        .dispatch_service
        .update_location(&user, request.latitude, request.longitude)
        .await?;

    Ok(ApiResponse::message("Driver location updated"))
}
