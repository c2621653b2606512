//! Order repository and the checkout transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use bullet_cloud_core::{
    AddressId, CartId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity, UserId,
    total_of,
};

use super::{OrderStore, RepositoryError, classify};
use crate::models::{CartItem, Order, OrderItem, OrderWithItems};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    shipping_address_id: AddressId,
    status: OrderStatus,
    total: Price,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            shipping_address_id: row.shipping_address_id,
            status: row.status,
            total: row.total,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: Quantity,
    price: Price,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, shipping_address_id, status, total, tracking_number, created_at, updated_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, price, created_at, updated_at";

/// A cart line as seen by checkout: what was priced must be what is cleared.
type LineSnapshot = (ProductId, Quantity, Price);

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_items(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        r"
        SELECT {ORDER_ITEM_COLUMNS}
        FROM order_items
        WHERE order_id = $1
        ORDER BY created_at ASC, id ASC
        "
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

impl OrderStore for OrderRepository<'_> {
    /// The checkout transaction.
    ///
    /// 1. Lock the cart row (serializes concurrent checkouts of one cart).
    /// 2. Insert the order as `pending` with the total of the supplied lines.
    /// 3. Copy every line into `order_items` verbatim.
    /// 4. Delete the cart's lines, which must be exactly the supplied ones.
    /// 5. Commit.
    ///
    /// Any error before the commit drops the transaction, which rolls back.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, cart_id = %cart_id))]
    async fn create_from_cart(
        &self,
        user_id: UserId,
        cart_id: CartId,
        shipping_address_id: AddressId,
        items: &[CartItem],
    ) -> Result<OrderWithItems, RepositoryError> {
        if items.is_empty() {
            return Err(RepositoryError::EmptyCart);
        }
        let total = total_of(items.iter().map(|item| (item.quantity, item.price)));

        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM carts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(cart_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or(RepositoryError::NotFound)?;

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, shipping_address_id, status, total)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(shipping_address_id)
        .bind(OrderStatus::Pending)
        .bind(total)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        let mut order_items = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItemRow>(&format!(
                r"
                INSERT INTO order_items (order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4)
                RETURNING {ORDER_ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
            order_items.push(OrderItem::from(row));
        }

        let mut removed = sqlx::query_as::<_, LineSnapshot>(
            "DELETE FROM cart_items WHERE cart_id = $1 RETURNING product_id, quantity, price",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(classify)?;

        let mut expected: Vec<LineSnapshot> = items
            .iter()
            .map(|item| (item.product_id, item.quantity, item.price))
            .collect();
        removed.sort_unstable();
        expected.sort_unstable();
        if removed != expected {
            tracing::warn!("cart changed between read and checkout, rolling back");
            return Err(RepositoryError::Conflict(
                "cart changed during checkout".to_owned(),
            ));
        }

        tx.commit().await.map_err(classify)?;

        let order = Order::from(order);
        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            items = order_items.len(),
            "order created"
        );

        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_with_items(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let items = fetch_items(&mut conn, id).await?;
        Ok(Some(OrderWithItems {
            order: row.into(),
            items,
        }))
    }

    #[tracing::instrument(skip_all, fields(order_id = %id, status = %status))]
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, RepositoryError> {
        let allowed_from: Vec<String> = OrderStatus::predecessors_of(status)
            .into_iter()
            .map(|s| s.as_str().to_owned())
            .collect();

        let mut tx = self.pool.begin().await?;

        // Concurrent writers re-check the predicate after the row lock, so
        // only one of two racing transitions can match.
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3::text[])
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(&allowed_from)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?;

        if let Some(row) = updated {
            tx.commit().await.map_err(classify)?;
            tracing::info!("order status updated");
            return Ok(row.into());
        }

        // Zero rows: tell a missing order apart from a disallowed transition.
        let current =
            sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.rollback().await?;

        match current {
            None => Err(RepositoryError::NotFound),
            Some(from) => Err(RepositoryError::InvalidTransition { from, to: status }),
        }
    }

    async fn update_tracking(
        &self,
        id: OrderId,
        tracking_number: &str,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET tracking_number = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(tracking_number)
        .fetch_optional(self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepositoryError::NotFound)?;

        tracing::info!(order_id = %id, "tracking number assigned");
        Ok(row.into())
    }
}
