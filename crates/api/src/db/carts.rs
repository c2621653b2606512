//! Cart repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bullet_cloud_core::{CartId, CartItemId, Price, ProductId, Quantity, UserId};

use super::{CartStore, RepositoryError, classify};
use crate::models::{Cart, CartItem};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: Quantity,
    price: Price,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CART_ITEM_COLUMNS: &str =
    "id, cart_id, product_id, quantity, price, created_at, updated_at";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl CartStore for CartRepository<'_> {
    async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        // A concurrent creator wins the insert; both callers read the same row.
        sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(classify)?;

        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            SELECT {CART_ITEM_COLUMNS}
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    async fn find_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND product_id = $2"
        ))
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CartItem::from))
    }

    #[tracing::instrument(skip_all, fields(cart_id = %cart_id, product_id = %product_id))]
    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        price: Price,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            INSERT INTO cart_items (cart_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                price = EXCLUDED.price,
                updated_at = clock_timestamp()
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .fetch_one(self.pool)
        .await
        .map_err(classify)?;

        Ok(row.into())
    }

    async fn update_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            UPDATE cart_items
            SET quantity = $3, updated_at = clock_timestamp()
            WHERE cart_id = $1 AND product_id = $2
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepositoryError::ProductNotInCart)?;

        Ok(row.into())
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ProductNotInCart);
        }
        Ok(())
    }

    async fn clear(&self, cart_id: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
