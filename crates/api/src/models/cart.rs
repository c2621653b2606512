//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bullet_cloud_core::{CartId, CartItemId, Price, ProductId, Quantity, UserId};

/// A user's cart. Exactly one per user, created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line in a cart.
///
/// `price` is the unit price observed on the most recent add, not a live
/// reference to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.line_total(self.quantity)
    }
}
