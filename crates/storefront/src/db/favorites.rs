//! Favorites repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pet_market_core::{FavoriteId, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Favorite, ProductSummary};

const FAVORITE_SELECT: &str = "SELECT f.id, f.product_id, f.create_time, \
            p.name, p.price, p.image, p.stock \
     FROM favorites f \
     JOIN products p ON p.id = f.product_id";

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    id: FavoriteId,
    product_id: ProductId,
    create_time: DateTime<Utc>,
    name: String,
    price: Price,
    image: String,
    stock: i32,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            create_time: row.create_time,
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.price,
                image: row.image,
                stock: row.stock,
            },
        }
    }
}

/// Repository for per-user favorites.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    /// Create a new favorites repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's favorites, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Favorite>, RepositoryError> {
        let sql = format!(
            "{FAVORITE_SELECT} WHERE f.user_id = $1 ORDER BY f.create_time DESC, f.id DESC"
        );
        let rows = sqlx::query_as::<_, FavoriteRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    /// Get a user's favorite for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Favorite>, RepositoryError> {
        let sql = format!(
            "{FAVORITE_SELECT} WHERE f.user_id = $1 AND f.product_id = $2 ORDER BY f.id LIMIT 1"
        );
        let row = sqlx::query_as::<_, FavoriteRow>(&sql)
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Favorite::from))
    }

    /// Favorite a product unless it already is, returning the favorite row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Favorite, RepositoryError> {
        if let Some(existing) = self.find(user_id, product_id).await? {
            return Ok(existing);
        }

        sqlx::query(
            "INSERT INTO favorites (user_id, product_id) \
             SELECT $1, id FROM products WHERE id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        self.find(user_id, product_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Un-favorite a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was not a favorite.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
