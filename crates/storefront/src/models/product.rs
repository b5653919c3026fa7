//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pet_market_core::{Price, ProductId};

/// A catalog product with its ordered image and spec-option lists.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub category: String,
    /// Cover image URL.
    pub image: String,
    /// Gallery image URLs, in display order.
    pub images: Vec<String>,
    pub description: String,
    /// Average rating, 0.0 to 5.0.
    pub rating: f64,
    pub sales: i32,
    pub stock: i32,
    /// Selectable variant options (e.g. `color:red`), in display order.
    pub specs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Live product display data joined into cart, favorite and order reads.
///
/// Reflects the catalog at read time; orders carry their own captured price
/// separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub stock: i32,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    /// Newest first.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    /// Best sellers first.
    Sales,
    /// Highest rated first.
    Rating,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. Ties break on id so paging is stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Default => "created_at DESC, id",
            Self::PriceAsc => "price ASC, id",
            Self::PriceDesc => "price DESC, id",
            Self::Sales => "sales DESC, id",
            Self::Rating => "rating DESC, id",
        }
    }
}

/// Filters for product listings. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive substring of the product name or description.
    pub keyword: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub sort: ProductSort,
}

/// Fields for creating a catalog product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub specs: Vec<String>,
}
