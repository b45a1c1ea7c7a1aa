//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are plain amounts in the store's single currency. Every amount that
//! reaches a shopper is formatted with [`Price::display`].

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Quantity;

/// An amount fell outside the range [`Decimal`] can represent.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("amount out of range")]
pub struct AmountOverflow;

/// A monetary amount in the store currency.
///
/// Serializes as a decimal string and accepts either a JSON number or a
/// decimal string when deserializing, so server payloads like `45.0` and
/// `"45.00"` both parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from whole currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Create a price from cents, e.g. `from_cents(1999)` is `$19.99`.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if the product does not fit a `Decimal`.
    pub fn times(self, quantity: Quantity) -> Result<Self, AmountOverflow> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Self)
            .ok_or(AmountOverflow)
    }

    /// Sum of two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if the sum does not fit a `Decimal`.
    pub fn checked_add(self, rhs: Self) -> Result<Self, AmountOverflow> {
        self.0.checked_add(rhs.0).map(Self).ok_or(AmountOverflow)
    }

    /// Difference of two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if the difference does not fit a `Decimal`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, AmountOverflow> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(AmountOverflow)
    }

    /// Sum of every amount in `prices`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] as soon as a partial sum overflows.
    pub fn checked_sum<I>(prices: I) -> Result<Self, AmountOverflow>
    where
        I: IntoIterator<Item = Self>,
    {
        prices
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${:.2}", self.0.round_dp(2))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}
