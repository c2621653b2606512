//! User repository for database operations.
//!
//! Accounts are owned by another service; the checkout core only needs to
//! know that the subject of a token still exists.

use sqlx::PgPool;

use bullet_cloud_core::UserId;

use super::{RepositoryError, UserDirectory};

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for UserRepository<'_> {
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }
}
