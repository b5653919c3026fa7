//! Cart routes.
//!
//! `POST /cart` adds onto an existing line with the same product and spec
//! selection; `PUT /cart/{line_id}` sets a line's quantity outright.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use pet_market_core::{CartLineId, ProductId, SpecSelection};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::CartLine;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Body of `POST /cart`.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub selected_specs: SpecSelection,
}

const fn default_quantity() -> i64 {
    1
}

/// Body of `PUT /cart/{line_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateCartLine {
    pub quantity: i64,
}

/// The cart with live product data.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<CartLine>>> {
    Ok(Json(CartService::new(state.pool()).list(user.id).await?))
}

/// Add units of a product to the cart.
#[tracing::instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<AddToCart>,
) -> Result<Json<CartLine>> {
    let line = CartService::new(state.pool())
        .add(user.id, body.product_id, &body.selected_specs, body.quantity)
        .await?;
    Ok(Json(line))
}

/// Set a line's quantity.
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(line_id): ApiPath<CartLineId>,
    ApiJson(body): ApiJson<UpdateCartLine>,
) -> Result<Json<CartLine>> {
    let line = CartService::new(state.pool())
        .update(user.id, line_id, body.quantity)
        .await?;
    Ok(Json(line))
}

/// Remove a line.
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(line_id): ApiPath<CartLineId>,
) -> Result<StatusCode> {
    CartService::new(state.pool())
        .remove(user.id, line_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    let removed = CartService::new(state.pool()).clear(user.id).await?;
    tracing::debug!(user_id = %user.id, removed, "Cart cleared");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_defaults() {
        let body: AddToCart = serde_json::from_str(
            r#"{"product_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10"}"#,
        )
        .unwrap();
        assert_eq!(body.quantity, 1);
        assert!(body.selected_specs.is_empty());
    }

    #[test]
    fn test_add_reads_spec_map() {
        let body: AddToCart = serde_json::from_str(
            r#"{"product_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10",
                "quantity": 3,
                "selected_specs": {"color": "red"}}"#,
        )
        .unwrap();
        assert_eq!(body.quantity, 3);
        assert_eq!(body.selected_specs.get("color"), Some("red"));
    }
}
