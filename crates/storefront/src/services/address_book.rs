//! Address book.
//!
//! At most one address per user is the default. Every write that can change
//! the default runs in one transaction that locks the user row, clears the
//! other defaults, then sets the new one. The partial unique index on
//! `addresses (user_id) WHERE is_default` backs this up at the database level.
//!
//! A user's first address becomes the default. Deleting the default promotes
//! the oldest remaining address.

use sqlx::PgPool;
use thiserror::Error;

use pet_market_core::{AddressError, AddressFields, AddressId, UserId};

use crate::db::{AddressRepository, RepositoryError};
use crate::models::Address;

/// Errors that can occur in the address book.
#[derive(Debug, Error)]
pub enum AddressBookError {
    /// Address fields failed validation.
    #[error("invalid address: {0}")]
    Invalid(#[from] AddressError),

    /// The address does not exist or belongs to another user.
    #[error("address not found")]
    NotFound,

    /// A concurrent write left another default in place.
    #[error("{0}")]
    Conflict(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AddressBookError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Repository(other),
        }
    }
}

impl From<sqlx::Error> for AddressBookError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Address book operations for one request.
pub struct AddressBook<'a> {
    pool: &'a PgPool,
    addresses: AddressRepository<'a>,
}

impl<'a> AddressBook<'a> {
    /// Create a new address book service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            addresses: AddressRepository::new(pool),
        }
    }

    /// The user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::Repository` if the database read fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, AddressBookError> {
        Ok(self.addresses.list(user_id).await?)
    }

    /// One of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::NotFound` if the address is not the user's.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, AddressBookError> {
        self.addresses
            .get(user_id, id)
            .await?
            .ok_or(AddressBookError::NotFound)
    }

    /// Save a new address. It becomes the default if requested or if it is
    /// the user's first.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::Repository` if a write fails.
    #[tracing::instrument(skip(self, fields))]
    pub async fn create(
        &self,
        user_id: UserId,
        fields: &AddressFields,
        make_default: bool,
    ) -> Result<Address, AddressBookError> {
        let mut tx = self.pool.begin().await?;
        AddressRepository::lock_owner(&mut tx, user_id).await?;

        let is_default = make_default || !AddressRepository::has_any(&mut tx, user_id).await?;
        if is_default {
            AddressRepository::clear_default(&mut tx, user_id, None).await?;
        }
        let address = AddressRepository::insert(&mut tx, user_id, fields, is_default).await?;

        tx.commit().await?;
        tracing::info!(address_id = %address.id, is_default, "Address created");
        Ok(address)
    }

    /// Replace an address's fields, optionally making it the default.
    ///
    /// Passing `make_default = false` never clears an existing default.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::NotFound` if the address is not the user's.
    #[tracing::instrument(skip(self, fields))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        fields: &AddressFields,
        make_default: bool,
    ) -> Result<Address, AddressBookError> {
        let mut tx = self.pool.begin().await?;
        AddressRepository::lock_owner(&mut tx, user_id).await?;

        let mut address = AddressRepository::update_fields(&mut tx, user_id, id, fields).await?;
        if make_default && !address.is_default {
            AddressRepository::clear_default(&mut tx, user_id, Some(id)).await?;
            AddressRepository::mark_default(&mut tx, user_id, id).await?;
            address.is_default = true;
        }

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's only default.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::NotFound` if the address is not the user's;
    /// in that case the previous default is kept.
    #[tracing::instrument(skip(self))]
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, AddressBookError> {
        let mut tx = self.pool.begin().await?;
        AddressRepository::lock_owner(&mut tx, user_id).await?;

        AddressRepository::clear_default(&mut tx, user_id, Some(id)).await?;
        AddressRepository::mark_default(&mut tx, user_id, id).await?;
        let address = AddressRepository::get_in(&mut tx, user_id, id)
            .await?
            .ok_or(AddressBookError::NotFound)?;

        tx.commit().await?;
        tracing::info!(address_id = %id, "Default address changed");
        Ok(address)
    }

    /// Delete an address. Orders keep their own snapshot and are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `AddressBookError::NotFound` if the address is not the user's.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), AddressBookError> {
        let mut tx = self.pool.begin().await?;
        AddressRepository::lock_owner(&mut tx, user_id).await?;

        let was_default = AddressRepository::delete(&mut tx, user_id, id).await?;
        if was_default && let Some(next) = AddressRepository::oldest(&mut tx, user_id).await? {
            AddressRepository::mark_default(&mut tx, user_id, next).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
