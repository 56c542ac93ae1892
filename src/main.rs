mod auth;
mod cart;
mod db;
mod dispatch;
mod error;
mod models;
mod orders;
mod payments;
mod pricing;
mod realtime;
mod response;
mod validation;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use auth::{AuthRepository, TokenService};
use cart::{CartRepository, CartService, CatalogRepository};
use dispatch::{DispatchRepository, DispatchService};
use orders::{OrderService, OrdersRepository};
use payments::{MercadoPagoGateway, PaymentGateway, PaymentService, PaymentsRepository};
use pricing::{DistanceProvider, HttpDistanceProvider};
use realtime::RealtimeBus;
use response::ApiResponse;

/// OpenAPI documentation for the customer-facing cart and checkout surface
#[derive(OpenApi)]
#[openapi(
    paths(
        cart::handlers::add_to_cart_handler,
        cart::handlers::update_cart_item_handler,
        cart::handlers::remove_cart_item_handler,
        cart::handlers::clear_cart_handler,
        cart::handlers::list_cart_handler,
        orders::handlers::checkout_handler,
    ),
    components(schemas(
        cart::AddToCartRequest,
        cart::UpdateCartItemRequest,
        cart::CartListView,
        cart::RestaurantCartView,
        cart::CartItemView,
        cart::CartModifierView,
        orders::PlaceOrderRequest,
        orders::CheckoutResponse,
        orders::PaymentMethod,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "cart", description = "Cart management endpoints"),
        (name = "checkout", description = "Order assembly endpoint")
    ),
    info(
        title = "Delixmi Order API",
        version = "1.0.0",
        description = "Order-lifecycle core of the Delixmi delivery platform"
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) db: PgPool,
    pub(crate) token_service: Arc<TokenService>,
    pub(crate) auth_repo: AuthRepository,
    pub(crate) cart_service: CartService,
    pub(crate) order_service: OrderService,
    pub(crate) payment_service: PaymentService,
    pub(crate) dispatch_service: DispatchService,
    pub(crate) realtime: Arc<RealtimeBus>,
}

/// Handler for GET /health
/// Reports liveness and database connectivity
async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ApiResponse::<()>::message("ok").into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            error::internal_error_response().into_response()
        }
    }
}

/// Creates and configures the application router
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health
        .route("/health", get(health_handler))
        // Cart
        .route("/api/cart", get(cart::list_cart_handler))
        .route("/api/cart/add", post(cart::add_to_cart_handler))
        .route("/api/cart/update/:item_id", put(cart::update_cart_item_handler))
        .route("/api/cart/remove/:item_id", delete(cart::remove_cart_item_handler))
        .route("/api/cart/clear", delete(cart::clear_cart_handler))
        // Checkout and webhook
        .route("/api/checkout/create-preference", post(orders::checkout_handler))
        .route("/api/webhooks/mercadopago", post(payments::webhook_handler))
        // Customer orders and addresses
        .route("/api/orders", get(orders::list_own_orders_handler))
        .route("/api/orders/:order_id", get(orders::get_own_order_handler))
        .route("/api/orders/:order_id/cancel", post(orders::cancel_own_order_handler))
        .route("/api/addresses", get(orders::list_addresses_handler))
        .route("/api/addresses", post(orders::create_address_handler))
        // Restaurant dashboard
        .route("/api/restaurant/orders", get(orders::list_restaurant_orders_handler))
        .route(
            "/api/restaurant/orders/:order_id/status",
            patch(orders::update_order_status_handler),
        )
        // Driver surface
        .route("/api/driver/orders/available", get(dispatch::available_orders_handler))
        .route(
            "/api/driver/orders/:order_id/accept",
            patch(dispatch::claim_order_handler),
        )
        .route(
            "/api/driver/orders/:order_id/complete",
            patch(dispatch::complete_order_handler),
        )
        .route("/api/driver/profile", get(dispatch::driver_profile_handler))
        .route("/api/driver/status", patch(dispatch::update_driver_status_handler))
        .route("/api/driver/location", patch(dispatch::update_driver_location_handler))
        // Realtime push channel
        .route("/ws", get(realtime::ws_handler))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Delixmi API - Starting...");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let mp_base_url = std::env::var("MP_BASE_URL")
        .unwrap_or_else(|_| "https://api.mercadopago.com".to_string());
    let mp_access_token = std::env::var("MP_ACCESS_TOKEN").expect("MP_ACCESS_TOKEN must be set");
    let mp_webhook_url = std::env::var("MP_WEBHOOK_URL").expect("MP_WEBHOOK_URL must be set");
    let routing_base_url = std::env::var("ROUTING_BASE_URL").expect("ROUTING_BASE_URL must be set");

    let db_pool_size = std::env::var("DB_POOL_SIZE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok());

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url, db_pool_size)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Wire services leaves-first: the realtime bus has no dependencies and
    // the order service sits on top of everything else
    let realtime = Arc::new(RealtimeBus::new());
    let token_service = Arc::new(TokenService::new(jwt_secret));
    let auth_repo = AuthRepository::new(db_pool.clone());

    let catalog = CatalogRepository::new(db_pool.clone());
    let carts = CartRepository::new(db_pool.clone());
    let cart_service = CartService::new(catalog.clone(), carts);

    let orders_repo = OrdersRepository::new(db_pool.clone());
    let payments_repo = PaymentsRepository::new(db_pool.clone());

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        MercadoPagoGateway::new(mp_base_url, mp_access_token, mp_webhook_url)
            .expect("Failed to build payment gateway client"),
    );
    let payment_service = PaymentService::new(
        db_pool.clone(),
        gateway,
        payments_repo,
        orders_repo.clone(),
        realtime.clone(),
    );

    let dispatch_repo = DispatchRepository::new(db_pool.clone());
    let dispatch_service = DispatchService::new(
        dispatch_repo,
        catalog.clone(),
        orders_repo.clone(),
        realtime.clone(),
    );

    let distance: Arc<dyn DistanceProvider> = Arc::new(
        HttpDistanceProvider::new(routing_base_url)
            .expect("Failed to build routing provider client"),
    );
    let order_service = OrderService::new(
        db_pool.clone(),
        catalog,
        orders_repo,
        distance,
        payment_service.clone(),
        dispatch_service.clone(),
        realtime.clone(),
    );

    let state = AppState {
        db: db_pool,
        token_service,
        auth_repo,
        cart_service,
        order_service,
        payment_service,
        dispatch_service,
        realtime,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Delixmi API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}
