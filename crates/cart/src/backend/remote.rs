//! Server-backed cart.

use std::sync::Arc;

use tienda_core::{LineItem, ProductId, Quantity};
use tracing::warn;

use crate::api::CartApi;
use crate::error::{CartError, Result};

/// Cart whose only copy lives on the server.
///
/// Nothing is cached here: every query is a round-trip, and callers re-fetch
/// the detail after each mutation.
#[derive(Clone)]
pub struct RemoteCart {
    api: Arc<dyn CartApi>,
}

impl std::fmt::Debug for RemoteCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCart").finish_non_exhaustive()
    }
}

/// Result of removing lines one by one.
#[derive(Debug, Default)]
pub struct ClearReport {
    pub removed: Vec<ProductId>,
    pub failed: Vec<(ProductId, CartError)>,
}

impl ClearReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl RemoteCart {
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>) -> Self {
        Self { api }
    }

    /// Current cart contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the detail request fails.
    pub async fn items(&self) -> Result<Vec<LineItem>> {
        self.api.detail().await
    }

    /// Server-side sum of quantities.
    ///
    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self) -> Result<u32> {
        self.api.count().await
    }

    /// Add one unit.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection or a transport error.
    pub async fn add(&self, product_id: ProductId) -> Result<Option<String>> {
        self.api.add(product_id).await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StockLimit`] when the server caps the quantity.
    pub async fn set_quantity(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        self.api.update(product_id, quantity).await
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection or a transport error.
    pub async fn remove(&self, product_id: ProductId) -> Result<()> {
        self.api.remove(product_id).await
    }

    /// Remove every line individually; the API has no bulk delete.
    ///
    /// A failed removal is recorded and the loop carries on with the next
    /// line.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial detail request fails.
    pub async fn clear(&self) -> Result<ClearReport> {
        let items = self.api.detail().await?;
        let mut report = ClearReport::default();

        for item in items {
            match self.api.remove(item.product_id).await {
                Ok(()) => report.removed.push(item.product_id),
                Err(e) => {
                    warn!(product_id = %item.product_id, error = %e, "Failed to remove cart line");
                    report.failed.push((item.product_id, e));
                }
            }
        }

        Ok(report)
    }
}
