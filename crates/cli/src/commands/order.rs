//! Order fulfilment commands.
//!
//! Shipping and delivery are driven by operators rather than customers, so
//! these transitions are exposed here instead of on the public API. They go
//! through the same repository, so the state machine is enforced the same
//! way: a disallowed transition fails and leaves the order untouched.

use bullet_cloud_api::db::{OrderRepository, OrderStore};
use bullet_cloud_api::services::ServiceError;
use bullet_cloud_api::services::orders::validate_tracking_number;
use bullet_cloud_core::{OrderId, OrderStatus};

use super::{CommandError, connect};

/// Transition an order to `status`.
pub async fn set_status(id: OrderId, status: OrderStatus) -> Result<(), CommandError> {
    let pool = connect().await?;

    let order = OrderRepository::new(&pool)
        .update_status(id, status)
        .await
        .map_err(ServiceError::from_repository("order"))?;

    tracing::info!(order_id = %order.id, status = %order.status, "order status updated");
    Ok(())
}

/// Set the tracking number on an order. The status is not changed.
pub async fn set_tracking(id: OrderId, tracking: &str) -> Result<(), CommandError> {
    let tracking = validate_tracking_number(tracking)?;
    let pool = connect().await?;

    let order = OrderRepository::new(&pool)
        .update_tracking(id, tracking)
        .await
        .map_err(ServiceError::from_repository("order"))?;

    tracing::info!(order_id = %order.id, tracking_number = tracking, "tracking number assigned");
    Ok(())
}
