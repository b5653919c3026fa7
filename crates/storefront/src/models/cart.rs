//! Cart domain types.

use serde::Serialize;

use pet_market_core::{CartLineId, Price, PriceError, ProductId, Quantity, SpecSelection};

use super::ProductSummary;

/// One cart line with live product display data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub selected_specs: SpecSelection,
    pub product: ProductSummary,
}

impl CartLine {
    /// Line total at the current catalog price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the total does not fit.
    pub fn subtotal(&self) -> Result<Price, PriceError> {
        self.product.price.line_total(self.quantity)
    }
}
