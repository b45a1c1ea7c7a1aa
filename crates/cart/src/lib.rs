//! Tienda cart library.
//!
//! Client-side shopping cart for the Tienda storefront: a state manager that
//! drives either a locally persisted cart or the server-held cart, reconciles
//! quantities against the server's stock limits, and renders the cart region
//! and navigation badge into a host-supplied [`surface::Surface`].
//!
//! # Modules
//!
//! - [`manager`] - [`CartStateManager`], the entry point for every mutation
//! - [`backend`] - Local and remote carts
//! - [`api`] - Storefront HTTP client
//! - [`view`] - Askama rendering of rows, summary and badge
//! - [`filter`] - Product listing filter

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod locks;
pub mod manager;
pub mod session;
pub mod store;
pub mod surface;
pub mod view;

pub use config::CartConfig;
pub use error::{CartError, Result};
pub use manager::{CartSnapshot, CartStateManager, CheckoutDecision, MutationOutcome};
pub use session::{BackendKind, BackendPolicy, CartSession};
