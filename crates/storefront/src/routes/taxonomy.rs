//! Category and banner routes. Only active rows are listed.

use axum::{Json, extract::State};
use serde::Deserialize;

use pet_market_core::PageRequest;

use crate::db::TaxonomyRepository;
use crate::error::Result;
use crate::models::{Banner, Category};
use crate::routes::extract::ApiQuery;
use crate::state::AppState;

/// `skip`/`limit` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Active categories ordered by `sort_order`.
pub async fn categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Category>>> {
    let page = PageRequest::new(query.skip, query.limit, state.config().max_page_size);
    Ok(Json(
        TaxonomyRepository::new(state.pool())
            .categories(page)
            .await?,
    ))
}

/// Active banners ordered by `sort_order`.
pub async fn banners(State(state): State<AppState>) -> Result<Json<Vec<Banner>>> {
    Ok(Json(TaxonomyRepository::new(state.pool()).banners().await?))
}
