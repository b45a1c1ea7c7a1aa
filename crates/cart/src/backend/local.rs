//! Cart held in a local persisted store.

use std::sync::Arc;

use tienda_core::{LineItem, ProductId, Quantity, Totals};
use tracing::debug;

use crate::error::{CartError, Result};
use crate::store::{CartStore, StoreError};

/// Ordered list of line items mirrored to a [`CartStore`].
///
/// Every mutation is computed on a copy and only becomes visible once the
/// store accepted it, so a failed write leaves the cart unchanged. A copy whose
/// totals are out of range is never written.
pub struct LocalCart {
    store: Arc<dyn CartStore>,
    items: Vec<LineItem>,
}

impl std::fmt::Debug for LocalCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCart")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl LocalCart {
    /// Open the cart, reading the store once.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn open(store: Arc<dyn CartStore>) -> std::result::Result<Self, StoreError> {
        let items = store.load()?;
        debug!(lines = items.len(), "Local cart opened");
        Ok(Self { store, items })
    }

    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Add one unit of `item`'s product: increment an existing line or append
    /// a new one with quantity 1. Returns the resulting quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn add(&mut self, item: LineItem) -> Result<Quantity> {
        let mut next = self.items.clone();
        let quantity = match next.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.increment();
                existing.quantity
            }
            None => {
                next.push(LineItem {
                    quantity: Quantity::ONE,
                    ..item
                });
                Quantity::ONE
            }
        };
        self.commit(next)?;
        Ok(quantity)
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] if the product is not in the cart, or
    /// an error if the store rejects the write.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        let mut next = self.items.clone();
        let line = next
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| not_in_cart(product_id))?;
        line.quantity = quantity;
        self.commit(next)
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotFound`] if the product is not in the cart, or
    /// an error if the store rejects the write.
    pub fn remove(&mut self, product_id: ProductId) -> Result<()> {
        if !self.items.iter().any(|i| i.product_id == product_id) {
            return Err(not_in_cart(product_id));
        }
        let next = self
            .items
            .iter()
            .filter(|i| i.product_id != product_id)
            .cloned()
            .collect();
        self.commit(next)
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new())
    }

    fn commit(&mut self, next: Vec<LineItem>) -> Result<()> {
        Totals::from_items(&next)?;
        self.store.save(&next).map_err(CartError::from)?;
        self.items = next;
        Ok(())
    }
}

pub(crate) fn not_in_cart(product_id: ProductId) -> CartError {
    CartError::NotFound(format!("El producto {product_id} no está en el carrito"))
}
