//! Catalog reads, admin product creation and per-user search history.

use sqlx::PgPool;
use thiserror::Error;

use pet_market_core::{Page, PageRequest, ProductId, UserId};

use crate::db::{ProductRepository, RepositoryError, SearchHistoryRepository};
use crate::models::{NewProduct, Product, ProductFilter, SearchHistoryEntry};

/// Maximum length of a stored search keyword (matches `search_history.keyword`).
const MAX_KEYWORD_LENGTH: usize = 100;

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The product does not exist.
    #[error("product not found")]
    NotFound,

    /// Product fields failed validation.
    #[error("invalid product: {0}")]
    Invalid(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog operations for one request.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    history: SearchHistoryRepository<'a>,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
            history: SearchHistoryRepository::new(pool),
        }
    }

    /// One page of products. A keyword search by a logged-in user is added to
    /// their search history.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if the price range is inverted.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
        searcher: Option<UserId>,
    ) -> Result<Page<Product>, CatalogError> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
            && min > max
        {
            return Err(CatalogError::Invalid(
                "min_price cannot exceed max_price".to_owned(),
            ));
        }

        if let (Some(user_id), Some(keyword)) = (searcher, filter.keyword.as_deref()) {
            let keyword: String = keyword.chars().take(MAX_KEYWORD_LENGTH).collect();
            // History is best effort; the search itself must still answer.
            if let Err(e) = self.history.record(user_id, &keyword).await {
                tracing::warn!(error = %e, "Failed to record search history");
            }
        }

        let (items, total) = self.products.list(filter, page).await?;
        Ok(Page::new(page, items, total))
    }

    /// One product with its images and specs.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products.get(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Create a product (admin).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if a field is out of range.
    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: NewProduct) -> Result<Product, CatalogError> {
        let new = validate_product(new)?;
        let product = self.products.create(&new).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// The user's recent searches.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the database read fails.
    pub async fn search_history(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SearchHistoryEntry>, CatalogError> {
        Ok(self.history.recent(user_id).await?)
    }

    /// Forget the user's searches.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the delete fails.
    pub async fn clear_search_history(&self, user_id: UserId) -> Result<u64, CatalogError> {
        Ok(self.history.clear(user_id).await?)
    }
}

fn validate_product(mut new: NewProduct) -> Result<NewProduct, CatalogError> {
    new.name = new.name.trim().to_owned();
    new.category = new.category.trim().to_owned();
    if new.name.is_empty() || new.name.chars().count() > 100 {
        return Err(CatalogError::Invalid(
            "name must be 1 to 100 characters".to_owned(),
        ));
    }
    if new.category.is_empty() || new.category.chars().count() > 50 {
        return Err(CatalogError::Invalid(
            "category must be 1 to 50 characters".to_owned(),
        ));
    }
    if !(0.0..=5.0).contains(&new.rating) {
        return Err(CatalogError::Invalid(
            "rating must be between 0 and 5".to_owned(),
        ));
    }
    if new.stock < 0 {
        return Err(CatalogError::Invalid("stock cannot be negative".to_owned()));
    }
    if new.specs.iter().any(|s| s.trim().is_empty() || s.chars().count() > 100) {
        return Err(CatalogError::Invalid(
            "specs must be 1 to 100 characters each".to_owned(),
        ));
    }
    if new.image.is_empty()
        && let Some(first) = new.images.first()
    {
        new.image.clone_from(first);
    }
    Ok(new)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pet_market_core::Price;

    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            name: " Chew Toy ".to_owned(),
            price: Price::from_cents(499).unwrap(),
            category: "toys".to_owned(),
            image: String::new(),
            images: vec!["/uploads/a.jpg".to_owned(), "/uploads/b.jpg".to_owned()],
            description: String::new(),
            rating: 4.5,
            stock: 10,
            specs: vec!["color:red".to_owned()],
        }
    }

    #[test]
    fn test_validate_trims_and_defaults_cover_image() {
        let product = validate_product(new_product()).unwrap();
        assert_eq!(product.name, "Chew Toy");
        assert_eq!(product.image, "/uploads/a.jpg");
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let mut bad = new_product();
        bad.rating = 5.5;
        assert!(matches!(validate_product(bad), Err(CatalogError::Invalid(_))));

        let mut bad = new_product();
        bad.stock = -1;
        assert!(validate_product(bad).is_err());

        let mut bad = new_product();
        bad.name = "   ".to_owned();
        assert!(validate_product(bad).is_err());
    }
}
