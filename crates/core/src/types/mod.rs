//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod id;
pub mod line_item;
pub mod price;
pub mod quantity;
pub mod totals;

pub use id::*;
pub use line_item::{LineItem, item_count};
pub use price::{AmountOverflow, Price};
pub use quantity::{Quantity, QuantityError};
pub use totals::Totals;
