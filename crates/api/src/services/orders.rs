//! Order reads and status changes.
//!
//! Every operation that names an order checks that the caller owns it:
//! a missing order is `NotFound`, someone else's order is `Forbidden`.

use bullet_cloud_core::{OrderId, OrderStatus, UserId};

use super::ServiceError;
use crate::db::OrderStore;
use crate::models::{Order, OrderWithItems};

const MAX_TRACKING_NUMBER_LENGTH: usize = 64;

/// Order operations for an authenticated user.
pub struct OrderService<O> {
    orders: O,
}

impl<O: OrderStore> OrderService<O> {
    pub const fn new(orders: O) -> Self {
        Self { orders }
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the store fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, ServiceError> {
        self.orders
            .list_for_user(user_id)
            .await
            .map_err(ServiceError::from_repository("order"))
    }

    /// One order with its items.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the order does not exist and
    /// `ServiceError::Forbidden` if it belongs to another user.
    pub async fn get(&self, user_id: UserId, id: OrderId) -> Result<OrderWithItems, ServiceError> {
        let order = self
            .orders
            .find_with_items(id)
            .await
            .map_err(ServiceError::from_repository("order"))?
            .ok_or(ServiceError::NotFound("order"))?;

        if order.order.user_id != user_id {
            tracing::warn!(order_id = %id, user_id = %user_id, "order access denied");
            return Err(ServiceError::Forbidden);
        }
        Ok(order)
    }

    /// Cancel a pending or processing order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::OrderCannotBeCancelled` if the order has
    /// already shipped, been delivered or been cancelled.
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<Order, ServiceError> {
        self.update_status(user_id, id, OrderStatus::Cancelled).await
    }

    /// Move an order along the status state machine.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a disallowed transition
    /// (`OrderCannotBeCancelled` when the target is `cancelled`).
    #[tracing::instrument(skip_all, fields(user_id = %user_id, order_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        user_id: UserId,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ServiceError> {
        self.get(user_id, id).await?;

        // The store re-checks the current status atomically; the read above
        // only establishes ownership.
        self.orders
            .update_status(id, status)
            .await
            .map_err(ServiceError::from_repository("order"))
    }

    /// Record a carrier tracking number. The status is left alone.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` for a blank or oversized
    /// tracking number.
    pub async fn assign_tracking(
        &self,
        user_id: UserId,
        id: OrderId,
        tracking_number: &str,
    ) -> Result<Order, ServiceError> {
        let tracking_number = validate_tracking_number(tracking_number)?;
        self.get(user_id, id).await?;

        self.orders
            .update_tracking(id, tracking_number)
            .await
            .map_err(ServiceError::from_repository("order"))
    }
}

/// Trimmed tracking number, or `InvalidArgument`.
///
/// # Errors
///
/// Returns `ServiceError::InvalidArgument` if the value is blank or longer
/// than 64 characters.
pub fn validate_tracking_number(raw: &str) -> Result<&str, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "tracking number is required".to_owned(),
        ));
    }
    if trimmed.chars().count() > MAX_TRACKING_NUMBER_LENGTH {
        return Err(ServiceError::InvalidArgument(format!(
            "tracking number must be at most {MAX_TRACKING_NUMBER_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_number_trimmed() {
        assert_eq!(validate_tracking_number(" 1Z999 ").unwrap(), "1Z999");
    }

    #[test]
    fn test_tracking_number_rejects_blank_and_long() {
        assert!(validate_tracking_number("  ").is_err());
        assert!(validate_tracking_number(&"9".repeat(65)).is_err());
    }
}
