//! Command implementations.

pub mod cart;
pub mod products;
