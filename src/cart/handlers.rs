// HTTP handlers for cart endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::auth::{evaluate, Action, AuthenticatedUser, Target};
use crate::cart::error::CartError;
use crate::cart::models::{
    AddToCartRequest, CartItem, CartListView, ClearCartQuery, UpdateCartItemRequest,
};
use crate::response::ApiResponse;

/// Handler for POST /api/cart/add
/// Adds a product with modifier options to the authenticated user's cart
#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Item added or merged into the cart"),
        (status = 400, description = "Invalid quantity or modifier selection"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn add_to_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartItem>>), CartError> {
    evaluate(
        &user,
        Action::MutateCart,
        Target::User {
            user_id: user.user_id,
        },
    )?;

    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    let item = state.cart_service.add(user.user_id, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Item added to cart", item),
    ))
}

/// Handler for PUT /api/cart/update/{itemId}
/// Updates a cart line's quantity; zero removes the line
#[utoipa::path(
    put,
    path = "/api/cart/update/{item_id}",
    params(("item_id" = i32, Path, description = "Cart item ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated or item removed"),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn update_cart_item_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<i32>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<ApiResponse<CartItem>>, CartError> {
    evaluate(
        &user,
        Action::MutateCart,
        Target::User {
            user_id: user.user_id,
        },
    )?;

    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    match state
        .cart_service
        .update_quantity(user.user_id, item_id, request.quantity)
        .await?
    {
        Some(item) => Ok(ApiResponse::ok("Cart item updated", item)),
        None => Ok(Json(ApiResponse {
            status: "success",
            message: "Cart item removed".to_string(),
            data: None,
        })),
    }
}

/// Handler for DELETE /api/cart/remove/{itemId}
#[utoipa::path(
    delete,
    path = "/api/cart/remove/{item_id}",
    params(("item_id" = i32, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, CartError> {
    evaluate(
        &user,
        Action::MutateCart,
        Target::User {
            user_id: user.user_id,
        },
    )?;

    state.cart_service.remove(user.user_id, item_id).await?;

    Ok(ApiResponse::message("Cart item removed"))
}

/// Handler for DELETE /api/cart/clear
/// Clears one restaurant's cart, or every cart without the query filter
#[utoipa::path(
    delete,
    path = "/api/cart/clear",
    params(("restaurantId" = Option<i32>, Query, description = "Limit the clear to one restaurant")),
    responses((status = 200, description = "Carts cleared")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn clear_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ClearCartQuery>,
) -> Result<Json<ApiResponse<()>>, CartError> {
    evaluate(
        &user,
        Action::MutateCart,
        Target::User {
            user_id: user.user_id,
        },
    )?;

    let cleared = state
        .cart_service
        .clear(user.user_id, query.restaurant_id)
        .await?;

    tracing::debug!("Cleared {} cart(s) for user {}", cleared, user.user_id);
    Ok(ApiResponse::message("Cart cleared"))
}

/// Handler for GET /api/cart
/// Lists the user's carts grouped by restaurant
#[utoipa::path(
    get,
    path = "/api/cart",
    responses((status = 200, description = "Carts grouped by restaurant", body = CartListView)),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn list_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<CartListView>>, CartError> {
    evaluate(
        &user,
        Action::ViewCart,
        Target::User {
            user_id: user.user_id,
        },
    )?;

    let view = state.cart_service.list(user.user_id).await?;

    Ok(ApiResponse::ok("Cart retrieved", view))
}
