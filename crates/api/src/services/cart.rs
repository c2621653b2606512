//! Cart service.
//!
//! Quantities arrive as raw integers from the client and are validated here,
//! before any storage call. The unit price always comes from the catalog at
//! the moment of the add.

use serde::Serialize;

use bullet_cloud_core::{Price, ProductId, Quantity, UserId, total_of};

use super::ServiceError;
use crate::db::{CartStore, ProductCatalog};
use crate::models::{Cart, CartItem};

/// A cart, its lines in insertion order, and their computed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartItem>,
    pub total: Price,
}

impl CartView {
    fn new(cart: Cart, items: Vec<CartItem>) -> Self {
        let total = total_of(items.iter().map(|item| (item.quantity, item.price)));
        Self { cart, items, total }
    }
}

/// Cart operations for an authenticated user.
pub struct CartService<C, P> {
    carts: C,
    catalog: P,
}

impl<C: CartStore, P: ProductCatalog> CartService<C, P> {
    pub const fn new(carts: C, catalog: P) -> Self {
        Self { carts, catalog }
    }

    async fn cart_for(&self, user_id: UserId) -> Result<Cart, ServiceError> {
        self.carts
            .get_or_create(user_id)
            .await
            .map_err(ServiceError::from_repository("cart"))
    }

    /// The user's cart, created on first access.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the store fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, ServiceError> {
        let cart = self.cart_for(user_id).await?;
        let items = self
            .carts
            .list_items(cart.id)
            .await
            .map_err(ServiceError::from_repository("cart"))?;
        Ok(CartView::new(cart, items))
    }

    /// Add `quantity` units of a product at its current catalog price.
    ///
    /// Adding a product already in the cart increases its quantity and
    /// replaces the stored unit price with the current one.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` if `quantity < 1` or the merged
    /// quantity would overflow, and `ServiceError::NotFound` if the product
    /// does not exist.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, product_id = %product_id, quantity = quantity))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, ServiceError> {
        let quantity =
            Quantity::new(quantity).map_err(|e| ServiceError::InvalidArgument(e.to_string()))?;

        let price = self
            .catalog
            .current_price(product_id)
            .await
            .map_err(ServiceError::from_repository("product"))?
            .ok_or(ServiceError::NotFound("product"))?;

        let cart = self.cart_for(user_id).await?;
        let existing = self
            .carts
            .find_item(cart.id, product_id)
            .await
            .map_err(ServiceError::from_repository("product"))?;
        if existing.is_some_and(|line| line.quantity.checked_add(quantity).is_none()) {
            return Err(ServiceError::InvalidArgument(format!(
                "quantity for this product cannot exceed {}",
                i32::MAX
            )));
        }

        // A concurrent add can still overflow; the store reports that as
        // `OutOfRange`, which maps to the same error.
        let item = self
            .carts
            .add_item(cart.id, product_id, quantity, price)
            .await
            .map_err(ServiceError::from_repository("product"))?;

        tracing::debug!(new_quantity = %item.quantity, price = %item.price, "cart line merged");
        Ok(item)
    }

    /// Set a line's quantity. Zero or below removes the line.
    ///
    /// Returns the updated line, or `None` if it was removed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::ProductNotInCart` if the cart has no line for
    /// the product.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Option<CartItem>, ServiceError> {
        let Ok(quantity) = Quantity::new(quantity) else {
            self.remove_item(user_id, product_id).await?;
            return Ok(None);
        };

        let cart = self.cart_for(user_id).await?;
        let item = self
            .carts
            .update_quantity(cart.id, product_id, quantity)
            .await
            .map_err(ServiceError::from_repository("product"))?;
        Ok(Some(item))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::ProductNotInCart` if there was nothing to remove.
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<(), ServiceError> {
        let cart = self.cart_for(user_id).await?;
        self.carts
            .remove_item(cart.id, product_id)
            .await
            .map_err(ServiceError::from_repository("product"))
    }

    /// Remove every line. Clearing an empty cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the store fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), ServiceError> {
        let cart = self.cart_for(user_id).await?;
        let removed = self
            .carts
            .clear(cart.id)
            .await
            .map_err(ServiceError::from_repository("cart"))?;
        tracing::info!(cart_id = %cart.id, removed, "cart cleared");
        Ok(())
    }
}
