//! Address book route handlers.

use axum::{Json, extract::State, http::StatusCode};

use bullet_cloud_core::AddressId;

use super::extract::{ApiJson, ApiPath};
use crate::db::AddressRepository;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{Address, AddressPatch, NewAddress};
use crate::services::AddressService;
use crate::state::AppState;

fn service(state: &AppState) -> AddressService<AddressRepository<'_>> {
    AddressService::new(AddressRepository::new(state.pool()))
}

/// `GET /api/addresses`
pub async fn index(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(service(&state).list(user_id).await?))
}

/// `POST /api/addresses`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<NewAddress>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = service(&state).create(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// `GET /api/addresses/{id}`
pub async fn show(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(service(&state).get(user_id, id).await?))
}

/// `PATCH /api/addresses/{id}`
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(patch): ApiJson<AddressPatch>,
) -> Result<Json<Address>> {
    Ok(Json(service(&state).update(user_id, id, patch).await?))
}

/// `DELETE /api/addresses/{id}`
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<StatusCode> {
    service(&state).delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/addresses/{id}/default`
pub async fn set_default(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(service(&state).set_default(user_id, id).await?))
}
