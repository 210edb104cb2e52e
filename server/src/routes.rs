use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;

use crate::baskets::routes as baskets;
use crate::contact::routes as contact;
use crate::state::AppState;
use crate::stocks::routes as stocks;
use crate::ws::handler as ws_handler;

/// Liveness text served to plain HTTP requests on `/`.
pub async fn index() -> &'static str {
    "Bullride backend is running!"
}

/// GET /api - Greeting used by the front end to check connectivity.
async fn api_hello() -> Json<Value> {
    Json(json!({ "message": "Hello from Bullride backend!" }))
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 contact submissions per minute per IP
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let contact_routes = Router::new()
        .route("/contact", post(contact::submit_contact))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Admin chat: the same handler answers plain GETs with the liveness text
    let chat_routes = Router::new()
        .route("/", get(ws_handler::ws_upgrade))
        .route("/ws", get(ws_handler::ws_upgrade));

    let public_routes = Router::new()
        .route("/api", get(api_hello))
        .route("/health", get(health_check));

    let stock_routes = Router::new()
        .route("/api/stocks/debug", get(stocks::debug_account))
        .route("/api/stocks/popular", get(stocks::popular))
        .route("/api/stocks/search", get(stocks::search))
        .route("/api/stocks/bars", get(stocks::bars))
        .route("/api/stocks/asset/{symbol}", get(stocks::asset));

    // Note: /api/baskets/create and the other fixed paths are POST/GET only,
    // so they never collide with DELETE /api/baskets/{id}.
    let basket_routes = Router::new()
        .route("/api/baskets/create", post(baskets::create_basket))
        .route("/api/baskets/user", get(baskets::user_baskets))
        .route("/api/baskets/explore", get(baskets::explore_baskets))
        .route("/api/baskets/{id}", delete(baskets::delete_basket));

    let cors = CorsLayer::new()
        .allow_origin(state.allowed_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .merge(chat_routes)
        .merge(public_routes)
        .merge(contact_routes)
        .merge(stock_routes)
        .merge(basket_routes)
        .layer(cors)
        .with_state(state)
}
