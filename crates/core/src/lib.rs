//! Tienda Core - Shared cart domain types.
//!
//! This crate provides the types used across all Tienda components:
//! - `cart` - Cart state manager, backends and rendering
//! - `cli` - Terminal host driving the cart manager
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no
//! HTTP clients, no persisted stores. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices and quantities, plus the
//!   line item and totals model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
