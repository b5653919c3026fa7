//! Order routes.
//!
//! `POST /orders` checks out either the whole cart or, when `items` is
//! present, just those lines (direct buy). The shipping address is either a
//! saved address id or inline fields, and is copied into the order.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use pet_market_core::{AddressId, OrderId, OrderStatus, ProductId, Quantity, SpecSelection};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::Order;
use crate::routes::addresses::AddressRequest;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::orders::{
    AddressChoice, Checkout, OrderError, OrderService, OrderSource, RequestedLine,
};
use crate::state::AppState;

/// Shipping address at checkout.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    Saved { address_id: AddressId },
    Inline(AddressRequest),
}

/// One direct-buy line.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub selected_specs: SpecSelection,
}

/// Body of `POST /orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    pub address: AddressInput,
    /// Direct-buy lines; absent means the whole cart.
    #[serde(default)]
    pub items: Option<Vec<ItemRequest>>,
}

impl CreateOrderRequest {
    fn into_checkout(self) -> Result<Checkout> {
        let address = match self.address {
            AddressInput::Saved { address_id } => AddressChoice::Saved(address_id),
            AddressInput::Inline(fields) => {
                AddressChoice::Inline(fields.to_fields().map_err(OrderError::from)?)
            }
        };
        let source = match self.items {
            None => OrderSource::Cart,
            Some(items) => OrderSource::Direct(
                items
                    .into_iter()
                    .map(|item| {
                        Ok(RequestedLine {
                            product_id: item.product_id,
                            quantity: Quantity::new(item.quantity)
                                .map_err(|e| AppError::Validation(e.to_string()))?,
                            selected_specs: item.selected_specs,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(Checkout {
            payment_method: self.payment_method,
            address,
            source,
        })
    }
}

/// Query of `POST /orders/{id}/pay`.
#[derive(Debug, Default, Deserialize)]
pub struct PayQuery {
    pub payment_method: Option<String>,
}

/// Body of `POST /orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Place an order.
#[tracing::instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let checkout = body.into_checkout()?;
    let order = OrderService::new(state.pool())
        .create(user.id, checkout)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The user's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(state.pool()).list(user.id).await?))
}

/// One order. Admins may read any order.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let owner = (!user.is_admin()).then_some(user.id);
    Ok(Json(OrderService::new(state.pool()).get(id, owner).await?))
}

/// Confirm payment of a pending order.
#[tracing::instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn pay(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<OrderId>,
    ApiQuery(query): ApiQuery<PayQuery>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .pay(id, user.id, query.payment_method.as_deref())
        .await?;
    Ok(Json(order))
}

/// Cancel one of the user's pending or paid orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .cancel(id, Some(user.id))
        .await?;
    Ok(Json(order))
}

/// Move an order along its lifecycle (admin).
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .set_status(id, body.status)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Checkout> {
        serde_json::from_str::<CreateOrderRequest>(json)
            .unwrap()
            .into_checkout()
    }

    #[test]
    fn test_saved_address_and_cart_source() {
        let checkout = parse(
            r#"{"payment_method": "alipay",
                "address": {"address_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10"}}"#,
        )
        .unwrap();
        assert!(matches!(checkout.address, AddressChoice::Saved(_)));
        assert!(matches!(checkout.source, OrderSource::Cart));
    }

    #[test]
    fn test_inline_address_and_direct_items() {
        let checkout = parse(
            r#"{"payment_method": "wechat",
                "address": {"name": "Mia", "phone": "13800000000", "province": "Zhejiang",
                            "city": "Hangzhou", "district": "Xihu", "detail": "12 Lakeside Road"},
                "items": [{"product_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10",
                           "quantity": 2, "selected_specs": {"size": "L"}}]}"#,
        )
        .unwrap();

        let AddressChoice::Inline(fields) = checkout.address else {
            panic!("expected inline address");
        };
        assert_eq!(fields.name, "Mia");

        let OrderSource::Direct(lines) = checkout.source else {
            panic!("expected direct-buy lines");
        };
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_zero_quantity_is_validation_error() {
        let err = parse(
            r#"{"payment_method": "alipay",
                "address": {"address_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10"},
                "items": [{"product_id": "8c6b4a52-6f55-4b8e-9a57-4d1f3e2a9c10", "quantity": 0}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_blank_inline_field_is_validation_error() {
        let err = parse(
            r#"{"payment_method": "alipay",
                "address": {"name": " ", "phone": "138", "province": "Z",
                            "city": "H", "district": "X", "detail": "D"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
