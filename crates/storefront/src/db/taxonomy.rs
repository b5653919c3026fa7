//! Categories and banners.

use sqlx::PgPool;

use pet_market_core::PageRequest;

use super::RepositoryError;
use crate::models::{Banner, Category};

/// Repository for read-mostly display taxonomy.
pub struct TaxonomyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxonomyRepository<'a> {
    /// Create a new taxonomy repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self, page: PageRequest) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, icon, sort_order FROM categories \
             WHERE is_active ORDER BY sort_order, id OFFSET $1 LIMIT $2",
        )
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Active banners in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn banners(&self) -> Result<Vec<Banner>, RepositoryError> {
        let banners = sqlx::query_as::<_, Banner>(
            "SELECT id, title, image_url, link_url, sort_order FROM banners \
             WHERE is_active ORDER BY sort_order, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(banners)
    }
}
