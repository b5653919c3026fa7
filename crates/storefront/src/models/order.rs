//! Order domain types.
//!
//! Orders and their items are write-once: only `status` (and the payment
//! method, when paying) changes after creation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pet_market_core::{
    AddressSnapshot, OrderId, OrderItemId, OrderNumber, OrderStatus, Price, PriceError,
    ProductId, Quantity, SpecSelection, UserId,
};

use super::ProductSummary;

/// A placed order with its items and frozen shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub payment_method: String,
    /// Sum of item price × quantity captured at creation.
    pub total_amount: Price,
    pub status: OrderStatus,
    pub create_time: DateTime<Utc>,
    /// Shipping address as it was when the order was placed.
    pub address: AddressSnapshot,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Recompute the total from the items.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the sum does not fit.
    pub fn items_total(&self) -> Result<Price, PriceError> {
        Price::try_sum(
            self.items
                .iter()
                .map(OrderItem::subtotal)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }
}

/// One purchased line: a captured price and spec selection.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Unit price at the time of purchase.
    pub price: Price,
    pub selected_specs: SpecSelection,
    /// Current product display data (name, image), not part of the record.
    pub product: ProductSummary,
}

impl OrderItem {
    /// Captured price × quantity.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the product does not fit.
    pub fn subtotal(&self) -> Result<Price, PriceError> {
        self.price.line_total(self.quantity)
    }
}
