//! Cart line repository.
//!
//! A line is identified by `(user_id, product_id, selected_specs)` where
//! `selected_specs` is the canonical text of a [`SpecSelection`], so adding the
//! same product with the same options always lands on the same row.

use sqlx::{PgPool, Postgres, Transaction};

use pet_market_core::{CartLineId, Price, ProductId, Quantity, SpecSelection, UserId};

use super::{RepositoryError, document_or_empty, stored_quantity};
use crate::models::{CartLine, ProductSummary};

const LINE_SELECT: &str = "SELECT c.id, c.product_id, c.quantity, c.selected_specs, \
            p.name, p.price, p.image, p.stock \
     FROM cart_items c \
     JOIN products p ON p.id = c.product_id";

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    product_id: ProductId,
    quantity: i32,
    selected_specs: String,
    name: String,
    price: Price,
    image: String,
    stock: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = stored_quantity(row.quantity, "cart_items", row.id)?;
        let selected_specs = document_or_empty(
            SpecSelection::from_storage(Some(&row.selected_specs)),
            "cart_items.selected_specs",
            row.id,
        );

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity,
            selected_specs,
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.price,
                image: row.image,
                stock: row.stock,
            },
        })
    }
}

/// A cart line as read for checkout, without display data.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub selected_specs: SpecSelection,
}

#[derive(sqlx::FromRow)]
struct CheckoutLineRow {
    id: CartLineId,
    product_id: ProductId,
    quantity: i32,
    selected_specs: String,
}

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines in a user's cart with live product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{LINE_SELECT} WHERE c.user_id = $1 ORDER BY c.id");
        sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    /// Get one of a user's lines. Other users' lines are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!("{LINE_SELECT} WHERE c.id = $1 AND c.user_id = $2");
        sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(line_id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(CartLine::try_from)
            .transpose()
    }

    /// Add `quantity` to the matching line, creating it if needed.
    ///
    /// Returns `None`, leaving the line untouched, when the combined quantity
    /// would exceed [`Quantity::MAX`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        specs: &SpecSelection,
        quantity: Quantity,
    ) -> Result<Option<CartLineId>, RepositoryError> {
        let sql = format!(
            "INSERT INTO cart_items (user_id, product_id, quantity, selected_specs) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, product_id, selected_specs) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             WHERE cart_items.quantity + EXCLUDED.quantity <= {} \
             RETURNING id",
            Quantity::MAX
        );
        let id = sqlx::query_scalar::<_, CartLineId>(&sql)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity.as_i32())
            .bind(specs.to_storage())
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// Set the absolute quantity of one of a user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the user.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2")
                .bind(line_id)
                .bind(user_id)
                .bind(quantity.as_i32())
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete one of a user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the user.
    pub async fn remove(&self, user_id: UserId, line_id: CartLineId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete every line in a user's cart, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Read and lock a user's whole cart for checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_checkout(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<Vec<CheckoutLine>, RepositoryError> {
        sqlx::query_as::<_, CheckoutLineRow>(
            "SELECT id, product_id, quantity, selected_specs FROM cart_items \
             WHERE user_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|row| {
            Ok(CheckoutLine {
                id: row.id,
                product_id: row.product_id,
                quantity: stored_quantity(row.quantity, "cart_items", row.id)?,
                selected_specs: document_or_empty(
                    SpecSelection::from_storage(Some(&row.selected_specs)),
                    "cart_items.selected_specs",
                    row.id,
                ),
            })
        })
        .collect()
    }

    /// Delete the given lines of a user's cart inside a checkout transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove_lines(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        line_ids: &[CartLineId],
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = line_ids.iter().map(CartLineId::as_i32).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}
