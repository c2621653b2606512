//! Cart route handlers.
//!
//! Every mutation responds with the full cart so clients never need a
//! second round trip to re-render it.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use bullet_cloud_core::ProductId;

use super::extract::{ApiJson, ApiPath};
use crate::db::{CartRepository, ProductRepository};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::services::{CartService, CartView};
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Body of `PUT /api/cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

fn service(state: &AppState) -> CartService<CartRepository<'_>, ProductRepository<'_>> {
    CartService::new(
        CartRepository::new(state.pool()),
        ProductRepository::new(state.pool()),
    )
}

/// `GET /api/cart`
pub async fn show(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<CartView>> {
    Ok(Json(service(&state).view(user_id).await?))
}

/// `POST /api/cart/items`
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<CartView>> {
    let carts = service(&state);
    carts.add_item(user_id, body.product_id, body.quantity).await?;
    Ok(Json(carts.view(user_id).await?))
}

/// `PUT /api/cart/items/{product_id}`
///
/// A quantity of zero or less removes the line.
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let carts = service(&state);
    carts.set_quantity(user_id, product_id, body.quantity).await?;
    Ok(Json(carts.view(user_id).await?))
}

/// `DELETE /api/cart/items/{product_id}`
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<CartView>> {
    let carts = service(&state);
    carts.remove_item(user_id, product_id).await?;
    Ok(Json(carts.view(user_id).await?))
}

/// `DELETE /api/cart`
pub async fn clear(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<StatusCode> {
    service(&state).clear(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
