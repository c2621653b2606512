//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Readiness (database reachable)
//!
//! # Cart
//! GET    /api/cart                      - Cart with items and total
//! DELETE /api/cart                      - Remove every item
//! POST   /api/cart/items                - Add (merges with an existing line)
//! PUT    /api/cart/items/{product_id}   - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{product_id}   - Remove one line
//!
//! # Addresses
//! GET    /api/addresses                 - List, default first
//! POST   /api/addresses                 - Create
//! GET    /api/addresses/{id}            - Show
//! PATCH  /api/addresses/{id}            - Partial update
//! DELETE /api/addresses/{id}            - Delete
//! PATCH  /api/addresses/{id}/default    - Make default
//!
//! # Orders
//! GET    /api/orders                    - List, newest first
//! POST   /api/orders                    - Checkout the cart
//! GET    /api/orders/{id}               - Order with items
//! PATCH  /api/orders/{id}/cancel        - Cancel
//! ```
//!
//! Every `/api` route requires `Authorization: Bearer <token>`.

pub mod addresses;
pub mod cart;
pub mod extract;
pub mod orders;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    routing::{get, patch, post, put},
};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .patch(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", patch(addresses::set_default))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::checkout))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", patch(orders::cancel))
}

/// Build the complete application router with its middleware stack.
///
/// Sentry layers are added by the binary so tests can drive this router
/// without a Sentry client.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);
    let timeout = state.config().request_timeout;

    let api = Router::new()
        .nest("/cart", cart_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "route not found" })),
    )
}
