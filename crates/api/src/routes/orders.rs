//! Checkout and order route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use bullet_cloud_core::{AddressId, OrderId};

use super::extract::{ApiJson, ApiPath};
use crate::db::{AddressRepository, CartRepository, OrderRepository};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{Order, OrderWithItems};
use crate::services::{CheckoutService, OrderService};
use crate::state::AppState;

/// Body of `POST /api/orders`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address_id: AddressId,
}

fn orders(state: &AppState) -> OrderService<OrderRepository<'_>> {
    OrderService::new(OrderRepository::new(state.pool()))
}

/// `POST /api/orders`
///
/// Turns the caller's cart into a pending order.
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let pool = state.pool();
    let checkout = CheckoutService::new(
        AddressRepository::new(pool),
        CartRepository::new(pool),
        OrderRepository::new(pool),
    );

    let order = checkout.checkout(user_id, body.shipping_address_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders`
pub async fn index(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders(&state).list(user_id).await?))
}

/// `GET /api/orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<OrderWithItems>> {
    Ok(Json(orders(&state).get(user_id, id).await?))
}

/// `PATCH /api/orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(orders(&state).cancel(user_id, id).await?))
}
