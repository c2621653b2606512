//! Checkout: turn the caller's cart into a pending order.

use bullet_cloud_core::{AddressId, Price, UserId, total_of};

use super::ServiceError;
use crate::db::{AddressStore, CartStore, OrderStore, RepositoryError};
use crate::models::OrderWithItems;

/// Orchestrates address validation, cart read and the order transaction.
pub struct CheckoutService<A, C, O> {
    addresses: A,
    carts: C,
    orders: O,
}

impl<A, C, O> CheckoutService<A, C, O>
where
    A: AddressStore,
    C: CartStore,
    O: OrderStore,
{
    pub const fn new(addresses: A, carts: C, orders: O) -> Self {
        Self {
            addresses,
            carts,
            orders,
        }
    }

    /// Check out the caller's cart to `shipping_address_id`.
    ///
    /// On success the order holds a frozen copy of every cart line, its total
    /// is the sum of `quantity × price` over those lines, and the cart is
    /// empty. On failure nothing has changed.
    ///
    /// # Errors
    ///
    /// - `ServiceError::InvalidArgument` if the address is not the caller's
    /// - `ServiceError::InvalidState` if the cart is empty, its total does not
    ///   fit an order, or the address or a product was deleted meanwhile
    /// - `ServiceError::Conflict` if the cart changed concurrently
    #[tracing::instrument(skip_all, fields(user_id = %user_id, address_id = %shipping_address_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address_id: AddressId,
    ) -> Result<OrderWithItems, ServiceError> {
        let address = self
            .addresses
            .find(user_id, shipping_address_id)
            .await
            .map_err(ServiceError::from_repository("address"))?;
        if address.is_none() {
            return Err(ServiceError::InvalidArgument(
                "shipping address not found or does not belong to user".to_owned(),
            ));
        }

        let cart = self
            .carts
            .get_or_create(user_id)
            .await
            .map_err(ServiceError::from_repository("cart"))?;
        let items = self
            .carts
            .list_items(cart.id)
            .await
            .map_err(ServiceError::from_repository("cart"))?;
        if items.is_empty() {
            return Err(ServiceError::InvalidState(
                "cannot create order from empty cart".to_owned(),
            ));
        }

        let total = total_of(items.iter().map(|item| (item.quantity, item.price)));
        if total > Price::MAX {
            return Err(ServiceError::InvalidState(format!(
                "order total {total} exceeds the maximum of {}",
                Price::MAX
            )));
        }

        let order = self
            .orders
            .create_from_cart(user_id, cart.id, shipping_address_id, &items)
            .await
            .map_err(checkout_error)?;

        tracing::info!(order_id = %order.order.id, total = %order.order.total, "checkout complete");
        Ok(order)
    }
}

/// Name the record that vanished between validation and the transaction.
fn checkout_error(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::InvalidReference(constraint) if constraint.contains("shipping_address") => {
            ServiceError::InvalidState("shipping address no longer exists".to_owned())
        }
        RepositoryError::InvalidReference(_) => {
            ServiceError::InvalidState("a product in the cart no longer exists".to_owned())
        }
        RepositoryError::OutOfRange(_) => {
            ServiceError::InvalidState("order total exceeds the maximum".to_owned())
        }
        other => ServiceError::from_repository("cart")(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanished_address_is_named() {
        let err = checkout_error(RepositoryError::InvalidReference(
            "orders_shipping_address_id_fkey".into(),
        ));
        assert_eq!(err.to_string(), "shipping address no longer exists");
    }

    #[test]
    fn test_vanished_product_is_named() {
        let err = checkout_error(RepositoryError::InvalidReference(
            "order_items_product_id_fkey".into(),
        ));
        assert_eq!(err.to_string(), "a product in the cart no longer exists");
    }

    #[test]
    fn test_race_stays_conflict() {
        let err = checkout_error(RepositoryError::Conflict("cart changed during checkout".into()));
        assert!(err.is_retryable());
    }
}
