//! Persisted store for the local cart.
//!
//! The local cart lives in a single serialized JSON array of line items. It
//! is read once when the cart opens and rewritten after every mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tienda_core::LineItem;

/// Errors from the persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored content is not a valid cart.
    #[error("Corrupt cart data: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable home of the local cart's item list.
pub trait CartStore: Send + Sync {
    /// Read the stored items. A store that was never written is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or decoded.
    fn load(&self) -> Result<Vec<LineItem>, StoreError>;

    /// Replace the stored items.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save(&self, items: &[LineItem]) -> Result<(), StoreError>;
}

/// Cart stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CartStore for JsonFileStore {
    fn load(&self) -> Result<Vec<LineItem>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(items)?;

        // Write beside the target and rename so a crash never leaves half a cart
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

/// In-memory store, for hosts without durable storage and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<Vec<LineItem>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `items`.
    #[must_use]
    pub fn with_items(items: Vec<LineItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Snapshot of what was last saved.
    #[must_use]
    pub fn saved(&self) -> Vec<LineItem> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStore for MemoryStore {
    fn load(&self) -> Result<Vec<LineItem>, StoreError> {
        Ok(self.saved())
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        *self.items.lock().unwrap_or_else(PoisonError::into_inner) = items.to_vec();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::{Price, ProductId, Quantity};

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("tienda-cart-{}.json", uuid::Uuid::new_v4()))
    }

    fn item(id: i32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: format!("Producto {id}"),
            unit_price: Price::from_units(10),
            quantity: Quantity::new(2).unwrap(),
            image_ref: String::new(),
            category: "Almacenamiento".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_cart() {
        let store = JsonFileStore::new(temp_path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_reload_from_new_store() {
        let path = temp_path();
        JsonFileStore::new(&path)
            .save(&[item(1), item(2)])
            .unwrap();

        // A fresh store over the same path sees the items, as after a restart
        let reloaded = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(reloaded, vec![item(1), item(2)]);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join(format!("tienda-missing-{}", uuid::Uuid::new_v4()))
            .join("cart.json");
        let err = JsonFileStore::new(path).save(&[item(1)]).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_items(vec![item(1)]);
        assert_eq!(store.load().unwrap().len(), 1);
        store.save(&[]).unwrap();
        assert!(store.saved().is_empty());
    }
}
