//! Favorites routes. Adding a product twice returns the existing favorite.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use pet_market_core::ProductId;

use crate::db::FavoriteRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Favorite;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Body of `POST /favorites`.
#[derive(Debug, Deserialize)]
pub struct AddFavorite {
    pub product_id: ProductId,
}

/// The user's favorites, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Favorite>>> {
    Ok(Json(FavoriteRepository::new(state.pool()).list(user.id).await?))
}

/// Favorite a product.
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<AddFavorite>,
) -> Result<Json<Favorite>> {
    let favorite = FavoriteRepository::new(state.pool())
        .add(user.id, body.product_id)
        .await?;
    Ok(Json(favorite))
}

/// Unfavorite a product.
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    FavoriteRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
