//! Catalog routes.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;

use pet_market_core::{Page, PageRequest, Price, ProductId};

use crate::error::Result;
use crate::middleware::{OptionalUser, RequireAdmin, RequireUser};
use crate::models::{NewProduct, Product, ProductFilter, ProductSort, SearchHistoryEntry};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    /// Keyword matched against name and description.
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

impl ListQuery {
    fn filter(self) -> ProductFilter {
        ProductFilter {
            category: non_blank(self.category),
            keyword: non_blank(self.q),
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// One page of products.
#[tracing::instrument(skip(state, user, query))]
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<Product>>> {
    let page = PageRequest::new(query.skip, query.limit, state.config().max_page_size);
    let filter = query.filter();
    let products = CatalogService::new(state.pool())
        .list(&filter, page, user.map(|u| u.id))
        .await?;
    Ok(Json(products))
}

/// One product with its images and specs.
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(CatalogService::new(state.pool()).get(id).await?))
}

/// Create a product (admin).
#[tracing::instrument(skip(state, admin, new), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(new): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.pool()).create(new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// The logged-in user's recent searches.
pub async fn search_history(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<SearchHistoryEntry>>> {
    Ok(Json(
        CatalogService::new(state.pool())
            .search_history(user.id)
            .await?,
    ))
}

/// Forget the logged-in user's searches.
pub async fn clear_search_history(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    CatalogService::new(state.pool())
        .clear_search_history(user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(query: &str) -> ListQuery {
        axum::extract::Query::<ListQuery>::try_from_uri(
            &format!("/products?{query}").parse().unwrap(),
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let filter = parse("category=%20&q=").filter();
        assert!(filter.category.is_none());
        assert!(filter.keyword.is_none());
    }

    #[test]
    fn test_query_parses_sort_and_prices() {
        let query = parse("skip=-5&limit=500&sort=price-asc&min_price=1.50&q=%20bone%20");
        assert_eq!(query.skip, Some(-5));
        assert_eq!(query.limit, Some(500));
        let filter = query.filter();
        assert_eq!(filter.sort, ProductSort::PriceAsc);
        assert_eq!(filter.min_price.unwrap().to_string(), "1.50");
        assert_eq!(filter.keyword.as_deref(), Some("bone"));
    }

    #[test]
    fn test_unknown_sort_is_rejected() {
        let uri = "/products?sort=cheapest".parse().unwrap();
        assert!(axum::extract::Query::<ListQuery>::try_from_uri(&uri).is_err());
    }
}
