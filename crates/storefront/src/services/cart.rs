//! Cart service.
//!
//! `add` accumulates onto the line with the same product and spec selection;
//! `update` sets a line's absolute quantity. Cart reads always show the live
//! catalog price; prices are only captured at checkout.

use sqlx::PgPool;
use thiserror::Error;

use pet_market_core::{CartLineId, ProductId, Quantity, QuantityError, SpecSelection, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::CartLine;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity is not a positive integer within bounds.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The line does not exist or belongs to another user.
    #[error("cart line not found")]
    NotFound,

    /// The product does not exist.
    #[error("product not found")]
    ProductNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for one request.
pub struct CartService<'a> {
    cart: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            cart: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// All lines in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database read fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self.cart.list(user_id).await?)
    }

    /// Add `quantity` units of a product with the given spec selection.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is not positive or
    /// the line would end up holding more than [`Quantity::MAX`].
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    #[tracing::instrument(skip(self, specs))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        specs: &SpecSelection,
        quantity: i64,
    ) -> Result<CartLine, CartError> {
        let quantity = Quantity::new(quantity)?;
        if !self.products.exists(product_id).await? {
            return Err(CartError::ProductNotFound);
        }

        let line_id = self
            .cart
            .add(user_id, product_id, specs, quantity)
            .await
            .map_err(|e| match e {
                // Product deleted between the check and the insert.
                RepositoryError::Database(sqlx::Error::Database(ref db))
                    if db.is_foreign_key_violation() =>
                {
                    CartError::ProductNotFound
                }
                other => CartError::Repository(other),
            })?
            .ok_or(CartError::InvalidQuantity(QuantityError::LineFull {
                max: Quantity::MAX,
            }))?;

        self.line(user_id, line_id).await
    }

    /// Set the absolute quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is not positive.
    /// Returns `CartError::NotFound` if the line is not the user's.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<CartLine, CartError> {
        let quantity = Quantity::new(quantity)?;
        self.cart
            .set_quantity(user_id, line_id, quantity)
            .await
            .map_err(not_found)?;
        self.line(user_id, line_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the line is not the user's.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, line_id: CartLineId) -> Result<(), CartError> {
        self.cart.remove(user_id, line_id).await.map_err(not_found)
    }

    /// Empty the user's cart, returning how many lines were removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, CartError> {
        Ok(self.cart.clear(user_id).await?)
    }

    async fn line(&self, user_id: UserId, line_id: CartLineId) -> Result<CartLine, CartError> {
        self.cart
            .get(user_id, line_id)
            .await?
            .ok_or(CartError::NotFound)
    }
}

fn not_found(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::NotFound,
        other => CartError::Repository(other),
    }
}
