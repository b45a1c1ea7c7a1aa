//! Cart backends.
//!
//! A session's cart is owned by exactly one backend:
//! - [`LocalCart`] - persisted locally, mutated synchronously
//! - [`RemoteCart`] - held by the server, every operation is a round-trip

mod local;
mod remote;

pub use local::LocalCart;
pub(crate) use local::not_in_cart;
pub use remote::{ClearReport, RemoteCart};

use std::sync::Arc;

use tienda_core::LineItem;
use tokio::sync::Mutex;

use crate::api::{CartApi, ProductLookup};
use crate::error::Result;
use crate::session::BackendKind;

/// The backend a manager drives.
pub enum Backend {
    Local {
        cart: Mutex<LocalCart>,
        products: Arc<dyn ProductLookup>,
    },
    Remote(RemoteCart),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { .. } => f.write_str("Backend::Local"),
            Self::Remote(_) => f.write_str("Backend::Remote"),
        }
    }
}

impl Backend {
    /// Local backend resolving product details through `products`.
    #[must_use]
    pub fn local(cart: LocalCart, products: Arc<dyn ProductLookup>) -> Self {
        Self::Local {
            cart: Mutex::new(cart),
            products,
        }
    }

    /// Server-backed backend.
    #[must_use]
    pub fn remote(api: Arc<dyn CartApi>) -> Self {
        Self::Remote(RemoteCart::new(api))
    }

    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Local { .. } => BackendKind::Local,
            Self::Remote(_) => BackendKind::Remote,
        }
    }

    /// Authoritative item list.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote detail request fails.
    pub async fn items(&self) -> Result<Vec<LineItem>> {
        match self {
            Self::Local { cart, .. } => Ok(cart.lock().await.items().to_vec()),
            Self::Remote(remote) => remote.items().await,
        }
    }
}
