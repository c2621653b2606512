//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bullet_cloud_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity, UserId,
};

/// A committed checkout.
///
/// `total` is fixed at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    pub status: OrderStatus,
    pub total: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A frozen copy of one cart line at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order together with its items, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
