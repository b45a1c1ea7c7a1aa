//! Storefront HTTP API.
//!
//! # Architecture
//!
//! - The server is the source of truth for the remote cart: no local copy is
//!   kept, every query is a round-trip
//! - Product lookups are cached via `moka` (TTL from configuration)
//! - [`CartApi`] and [`ProductLookup`] are the seams the manager depends on;
//!   [`HttpCartClient`] implements both over `reqwest`
//!
//! # Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/api/carrito/contador` | `{contador}` |
//! | GET | `/api/carrito/detalle` | `[{producto_id, nombre, categoria, precio, cantidad, imagen}]` |
//! | GET | `/api/carrito/agregar/{id}` | `{success, message?, error?}` |
//! | GET | `/api/carrito/actualizar/{id}/{qty}` | `{success, error?}` |
//! | GET | `/api/carrito/eliminar/{id}` | `{success, error?}` |
//! | GET | `/api/productos/{id}` | product detail |
//! | GET | `/api/productos` | product listing |

mod client;
pub mod stock;
pub mod wire;

pub use client::HttpCartClient;
pub use stock::parse_stock_limit;
pub use wire::Product;

use async_trait::async_trait;
use tienda_core::{LineItem, ProductId, Quantity};

use crate::error::Result;

/// Server-backed cart operations.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Sum of quantities in the server cart.
    async fn count(&self) -> Result<u32>;

    /// Full cart contents in server order.
    async fn detail(&self) -> Result<Vec<LineItem>>;

    /// Add one unit of a product, returning the server's message.
    async fn add(&self, product_id: ProductId) -> Result<Option<String>>;

    /// Set the quantity of a line.
    ///
    /// Fails with [`crate::CartError::StockLimit`] when the server caps it.
    async fn update(&self, product_id: ProductId, quantity: Quantity) -> Result<()>;

    /// Delete a line.
    async fn remove(&self, product_id: ProductId) -> Result<()>;
}

/// Product detail lookup used by the local cart's add path.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn product(&self, product_id: ProductId) -> Result<Product>;
}
