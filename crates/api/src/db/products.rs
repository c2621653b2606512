//! Product catalog lookups.

use sqlx::PgPool;

use bullet_cloud_core::{Price, ProductId};

use super::{ProductCatalog, RepositoryError};

/// Read-only access to product prices.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for ProductRepository<'_> {
    async fn current_price(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError> {
        let price = sqlx::query_scalar::<_, Price>("SELECT price FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(price)
    }
}
