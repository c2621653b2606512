//! Address repository.
//!
//! Default-address changes run in one transaction that first locks the
//! owning user row, so two concurrent default swaps for the same user are
//! serialized. The partial unique index `addresses_one_default_per_user`
//! backs the rule at the storage level.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use bullet_cloud_core::{AddressId, UserId};

use super::{AddressStore, RepositoryError, classify};
use crate::models::{Address, AddressPatch, NewAddress};

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    street: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            street: row.street,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, street, city, state, postal_code, country, is_default, created_at, updated_at";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

/// Lock the user row for the rest of the transaction.
async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

/// Clear the default flag on every address of the user except `keep`.
async fn clear_defaults(
    conn: &mut PgConnection,
    user_id: UserId,
    keep: Option<AddressId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE addresses
        SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_default AND ($2::uuid IS NULL OR id <> $2)
        ",
    )
    .bind(user_id)
    .bind(keep)
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(())
}

impl AddressStore for AddressRepository<'_> {
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    async fn create(&self, user_id: UserId, address: &NewAddress) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_user(&mut tx, user_id).await?;
        if address.is_default {
            clear_defaults(&mut tx, user_id, None).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO addresses (user_id, street, city, state, postal_code, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        Ok(row.into())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS}
            FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn find(&self, user_id: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, address_id = %id))]
    async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_user(&mut tx, user_id).await?;
        if patch.sets_default() {
            clear_defaults(&mut tx, user_id, Some(id)).await?;
        }

        // A missing row drops `tx`, which rolls back the clear above.
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE addresses SET
                street = COALESCE($3, street),
                city = COALESCE($4, city),
                state = COALESCE($5, state),
                postal_code = COALESCE($6, postal_code),
                country = COALESCE($7, country),
                is_default = COALESCE($8, is_default),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.street.as_deref())
        .bind(patch.city.as_deref())
        .bind(patch.state.as_deref())
        .bind(patch.postal_code.as_deref())
        .bind(patch.country.as_deref())
        .bind(patch.is_default)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await.map_err(classify)?;
        Ok(row.into())
    }

    async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| match classify(e) {
                RepositoryError::InvalidReference(_) => {
                    RepositoryError::InUse("address is used by an order".to_owned())
                }
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, address_id = %id))]
    async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_user(&mut tx, user_id).await?;
        clear_defaults(&mut tx, user_id, Some(id)).await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE addresses
            SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await.map_err(classify)?;
        tracing::info!("default address changed");
        Ok(row.into())
    }
}
