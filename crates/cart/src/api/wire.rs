//! JSON payloads of the storefront cart API.

use serde::{Deserialize, Deserializer};
use tienda_core::{LineItem, Price, ProductId, Quantity};
use tracing::warn;

use super::stock::parse_stock_limit;
use crate::error::CartError;

/// `GET /api/carrito/contador`
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    /// The server sums quantities in SQL, so this may arrive as a number,
    /// a decimal string, or null for an empty cart.
    #[serde(deserialize_with = "deserialize_count")]
    pub contador: u32,
}

/// One row of `GET /api/carrito/detalle`.
#[derive(Debug, Deserialize)]
pub struct DetailItem {
    pub producto_id: ProductId,
    pub nombre: String,
    #[serde(default)]
    pub categoria: Option<String>,
    pub precio: Price,
    pub cantidad: i64,
    #[serde(default)]
    pub imagen: Option<String>,
}

impl DetailItem {
    /// Convert to a line item, skipping rows the server reports with no units.
    #[must_use]
    pub fn into_line_item(self) -> Option<LineItem> {
        let Ok(quantity) = Quantity::new(self.cantidad) else {
            warn!(
                product_id = %self.producto_id,
                cantidad = self.cantidad,
                "Skipping cart row with non-positive quantity"
            );
            return None;
        };

        Some(LineItem {
            product_id: self.producto_id,
            name: self.nombre,
            unit_price: self.precio,
            quantity,
            image_ref: self.imagen.unwrap_or_default(),
            category: self.categoria.unwrap_or_default(),
        })
    }
}

/// Product detail from `GET /api/productos/{id}` and `GET /api/productos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub precio: Price,
    #[serde(default)]
    pub categoria: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub imagen: Option<String>,
}

impl Product {
    /// A fresh line item for this product with one unit.
    #[must_use]
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            product_id: self.id,
            name: self.nombre.clone(),
            unit_price: self.precio,
            quantity: Quantity::ONE,
            image_ref: self.imagen.clone().unwrap_or_default(),
            category: self.categoria.clone().unwrap_or_default(),
        }
    }
}

/// `{error: "..."}` body of a failed product lookup.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Response of the add, update and remove endpoints.
#[derive(Debug, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Failure detail of a mutation.
///
/// Servers that know about stock limits send the structured form; older ones
/// embed the number in prose and we fall back to [`parse_stock_limit`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiError {
    Structured {
        kind: ApiErrorKind,
        #[serde(default)]
        available: Option<u32>,
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    StockLimit,
    #[serde(other)]
    Other,
}

impl MutationResponse {
    /// Success message, or the error the server reported.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StockLimit`] when the server signals a stock limit,
    /// [`CartError::Rejected`] for any other refusal.
    pub fn into_result(self) -> Result<Option<String>, CartError> {
        if self.success {
            return Ok(self.message);
        }

        match self.error {
            Some(ApiError::Structured {
                kind: ApiErrorKind::StockLimit,
                available: Some(available),
                message,
            }) => Err(CartError::StockLimit {
                available,
                message: message
                    .unwrap_or_else(|| format!("Solo quedan {available} unidades disponibles")),
            }),
            Some(ApiError::Structured { message, .. }) => Err(CartError::Rejected(
                message.unwrap_or_else(|| "Operación rechazada".to_string()),
            )),
            Some(ApiError::Text(text)) => match parse_stock_limit(&text) {
                Some(available) => Err(CartError::StockLimit {
                    available,
                    message: text,
                }),
                None => Err(CartError::Rejected(text)),
            },
            None => Err(CartError::Rejected(
                self.message
                    .unwrap_or_else(|| "Operación rechazada".to_string()),
            )),
        }
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    let count = match &value {
        serde_json::Value::Null => Some(0),
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(float_to_u64)),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<rust_decimal::Decimal>()
            .ok()
            .filter(|d| !d.is_sign_negative() && d.fract().is_zero())
            .and_then(|d| u64::try_from(d).ok()),
        _ => None,
    };

    count
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| D::Error::custom(format!("invalid cart count: {value}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // checked non-negative integral
fn float_to_u64(value: f64) -> u64 {
    value as u64
}
