//! Per-product mutation serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tienda_core::ProductId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

type KeyMap = HashMap<ProductId, Arc<Mutex<()>>>;

/// Keyed async locks.
///
/// Mutations of the same product queue behind each other; mutations of
/// different products run concurrently. [`KeyedLocks::lock_all`] excludes
/// every keyed holder. A product's entry lives only while someone holds or
/// waits for it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    cart: RwLock<()>,
    keys: StdMutex<KeyMap>,
}

/// Held while a single product is being mutated.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    product_id: ProductId,
    key: Option<OwnedMutexGuard<()>>,
    keys: &'a StdMutex<KeyMap>,
    _cart: RwLockReadGuard<'a, ()>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Waiters clone the Arc under the map lock, so with the map locked a
        // count of one means nobody else wants this key.
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.key.take());
        if keys
            .get(&self.product_id)
            .is_some_and(|key| Arc::strong_count(key) == 1)
        {
            keys.remove(&self.product_id);
        }
    }
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `product_id`.
    pub async fn lock(&self, product_id: ProductId) -> KeyGuard<'_> {
        let cart = self.cart.read().await;
        let key = {
            let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(keys.entry(product_id).or_default())
        };
        KeyGuard {
            product_id,
            key: Some(key.lock_owned().await),
            keys: &self.keys,
            _cart: cart,
        }
    }

    /// Wait until no product is being mutated, then hold the whole cart.
    pub async fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
        self.cart.write().await
    }

    /// Number of products currently locked or waited on.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
