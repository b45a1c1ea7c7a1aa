//! Line item quantity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is below the minimum of one unit.
    #[error("quantity must be at least 1 (got {0})")]
    BelowMinimum(i64),
    /// The value does not fit the quantity range.
    #[error("quantity {0} is out of range")]
    OutOfRange(i64),
}

/// A line item quantity, always at least one.
///
/// A cart line never holds zero units: removal is an explicit operation, and
/// any attempt to go below one is clamped back to one.
///
/// ## Examples
///
/// ```
/// use tienda_core::Quantity;
///
/// assert_eq!(Quantity::clamped(0).get(), 1);
/// assert_eq!(Quantity::clamped(-4).get(), 1);
/// assert_eq!(Quantity::clamped(5).get(), 5);
/// assert!(Quantity::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// One unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity, rejecting values below one.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is less than one or larger than `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::BelowMinimum(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::OutOfRange(value))
    }

    /// Create a quantity, mapping every value below one to one.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        Self(u32::try_from(value.max(1)).unwrap_or(u32::MAX))
    }

    /// The number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Add `delta` units (which may be negative) and clamp to at least one.
    #[must_use]
    pub fn offset(self, delta: i64) -> Self {
        Self::clamped(i64::from(self.0).saturating_add(delta))
    }

    /// Increment by one unit.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}
