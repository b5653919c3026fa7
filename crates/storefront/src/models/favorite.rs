//! Favorites and search history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pet_market_core::{FavoriteId, ProductId, SearchHistoryId};

use super::ProductSummary;

/// A product the user bookmarked.
#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub product_id: ProductId,
    pub create_time: DateTime<Utc>,
    pub product: ProductSummary,
}

/// A keyword the user searched for.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SearchHistoryEntry {
    pub id: SearchHistoryId,
    pub keyword: String,
    pub search_time: DateTime<Utc>,
}
