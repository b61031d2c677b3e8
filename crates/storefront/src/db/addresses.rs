//! Address repository.
//!
//! A user has at most one default address. Setting a new default clears the
//! previous one in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use animart_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = r"
    id, user_id, full_name, line1, line2, city, state, postal_code, country, phone,
    is_default, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: Option<String>,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            full_name: r.full_name,
            line1: r.line1,
            line2: r.line2,
            city: r.city,
            state: r.state,
            postal_code: r.postal_code,
            country: r.country,
            phone: r.phone,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for saved addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM shop.address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Address::from))
    }

    /// Save a new address. The first address a user saves becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.address WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || !has_any;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO shop.address
                (user_id, full_name, line1, line2, city, state, postal_code, country, phone, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(input.state.as_deref())
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.phone.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.address
            SET full_name = $3, line1 = $4, line2 = $5, city = $6, state = $7,
                postal_code = $8, country = $9, phone = $10,
                is_default = is_default OR $11
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(input.state.as_deref())
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.phone.as_deref())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete one of a user's addresses. If it was the default, the most
    /// recent remaining address takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM shop.address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE shop.address SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM shop.address WHERE user_id = $1
                    ORDER BY created_at DESC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.address SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
