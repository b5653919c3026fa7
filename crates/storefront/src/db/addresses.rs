//! Address book repository.
//!
//! Writes that touch the default flag run inside a transaction that first
//! locks the owning user row (see [`AddressRepository::lock_owner`]), which
//! serializes default changes per user.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use pet_market_core::{AddressFields, AddressId, UserId};

use super::RepositoryError;
use crate::models::Address;

const ADDRESS_COLUMNS: &str =
    "id, user_id, name, phone, province, city, district, detail, is_default, created_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    name: String,
    phone: String,
    province: String,
    city: String,
    district: String,
    detail: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        let fields = AddressFields::new(
            &row.name,
            &row.phone,
            &row.province,
            &row.city,
            &row.district,
            &row.detail,
        )
        .map_err(|e| RepositoryError::DataCorruption(format!("address {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            fields,
            is_default: row.is_default,
            created_at: row.created_at,
        })
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

    /// A user's addresses, default first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at, id"
        );
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Address::try_from)
            .collect()
    }

    /// Get one of a user's addresses. Other users' addresses are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Address::try_from)
            .transpose()
    }

    /// Get one of a user's addresses inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(Address::try_from)
            .transpose()
    }

    /// Lock the owning user row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn lock_owner(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(())
    }

    /// Whether the user has any saved address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_any(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(found)
    }

    /// Insert an address. The caller clears other defaults first when
    /// `is_default` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        fields: &AddressFields,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            "INSERT INTO addresses \
                 (id, user_id, name, phone, province, city, district, detail, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(AddressId::generate())
            .bind(user_id)
            .bind(&fields.name)
            .bind(fields.phone.as_str())
            .bind(&fields.province)
            .bind(&fields.city)
            .bind(&fields.district)
            .bind(&fields.detail)
            .bind(is_default)
            .fetch_one(&mut **tx)
            .await?;
        Address::try_from(row)
    }

    /// Replace the fields of one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn update_fields(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        id: AddressId,
        fields: &AddressFields,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            "UPDATE addresses SET name = $3, phone = $4, province = $5, city = $6, \
                 district = $7, detail = $8 \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&fields.name)
            .bind(fields.phone.as_str())
            .bind(&fields.province)
            .bind(&fields.city)
            .bind(&fields.district)
            .bind(&fields.detail)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Address::try_from(row)
    }

    /// Clear the default flag on every address of a user except `keep`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn clear_default(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        keep: Option<AddressId>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE addresses SET is_default = FALSE \
             WHERE user_id = $1 AND is_default AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(user_id)
        .bind(keep)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Mark one of a user's addresses as default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    /// Returns `RepositoryError::Conflict` if another default still exists.
    pub async fn mark_default(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        id: AddressId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE addresses SET is_default = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            super::conflict_or_database(e, |_| "user already has a default address".to_owned())
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete one of a user's addresses, returning whether it was the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    pub async fn delete(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        id: AddressId,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            "DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// The user's oldest remaining address, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn oldest(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<Option<AddressId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, AddressId>(
            "SELECT id FROM addresses WHERE user_id = $1 ORDER BY created_at, id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(id)
    }
}
