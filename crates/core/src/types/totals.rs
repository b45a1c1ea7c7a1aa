//! Cart totals.
//!
//! Totals are derived from the current item list every time they are needed;
//! nothing here is stored or patched incrementally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AmountOverflow, LineItem, Price};

/// Subtotal above which shipping is free (exclusive).
pub const FREE_SHIPPING_THRESHOLD: Price = Price::new(Decimal::from_parts(20_000, 0, 0, false, 2));

/// Flat shipping charge for carts at or below the threshold.
pub const FLAT_SHIPPING: Price = Price::new(Decimal::from_parts(1_500, 0, 0, false, 2));

/// Computed cart summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Price,
    pub shipping: Price,
    /// Always zero in this build.
    pub discount: Price,
    pub total: Price,
}

impl Totals {
    /// Totals of a cart with no lines: flat shipping only.
    pub const EMPTY: Self = Self {
        subtotal: Price::ZERO,
        shipping: FLAT_SHIPPING,
        discount: Price::ZERO,
        total: FLAT_SHIPPING,
    };

    /// Compute totals for `items`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if a line total or the sum is out of range.
    pub fn from_items(items: &[LineItem]) -> Result<Self, AmountOverflow> {
        let lines = items
            .iter()
            .map(LineItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        let subtotal = Price::checked_sum(lines)?;
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Price::ZERO
        } else {
            FLAT_SHIPPING
        };
        let discount = Price::ZERO;

        Ok(Self {
            subtotal,
            shipping,
            discount,
            total: subtotal.checked_add(shipping)?.checked_sub(discount)?,
        })
    }
}
