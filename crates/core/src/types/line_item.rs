//! Cart line item.

use serde::{Deserialize, Serialize};

use super::{AmountOverflow, Price, ProductId, Quantity};

/// One product entry in a cart with its quantity.
///
/// A cart holds at most one line item per [`ProductId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    /// Image file name relative to the product image directory.
    pub image_ref: String,
    pub category: String,
}

impl LineItem {
    /// Price of this line: unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if the line total is out of range.
    pub fn line_total(&self) -> Result<Price, AmountOverflow> {
        self.unit_price.times(self.quantity)
    }
}

/// Sum of quantities across `items`, as shown on the navigation badge.
#[must_use]
pub fn item_count(items: &[LineItem]) -> u32 {
    items
        .iter()
        .fold(0u32, |acc, item| acc.saturating_add(item.quantity.get()))
}
