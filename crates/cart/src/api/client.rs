//! `reqwest` implementation of the storefront cart API.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tienda_core::{LineItem, ProductId, Quantity};
use tracing::{debug, instrument};
use url::Url;

use super::wire::{CountResponse, DetailItem, ErrorBody, MutationResponse, Product};
use super::{CartApi, ProductLookup};
use crate::config::CartConfig;
use crate::error::{CartError, Result};

/// Longest body excerpt kept in logs and errors.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the storefront cart and product endpoints.
///
/// Cheaply cloneable. Product details are cached; cart endpoints never are.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    base_url: Url,
    session_cookie: Option<SecretString>,
    products: Cache<ProductId, Product>,
}

impl std::fmt::Debug for HttpCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field(
                "session_cookie",
                &self.inner.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpCartClient {
    /// Create a new client from configuration.
    #[must_use]
    pub fn new(config: &CartConfig) -> Self {
        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Self {
            inner: Arc::new(HttpCartClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                session_cookie: config.session_cookie.clone(),
                products,
            }),
        }
    }

    /// Whether requests carry a session identity.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.inner.session_cookie.is_some()
    }

    /// Full product listing, used for catalog filtering.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the listing cannot be parsed.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let (status, body) = self.get("api/productos").await?;
        decode(status, &body)
    }

    /// Issue a GET and return the status with the raw body.
    async fn get(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = self.inner.base_url.join(path)?;

        let mut request = self.inner.client.get(url);
        if let Some(cookie) = &self.inner.session_cookie {
            request = request.header(COOKIE, cookie.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(path, status = %status, "Storefront API response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(CartError::NotAuthenticated);
        }

        Ok((status, body))
    }

    /// Issue a mutation GET and interpret its `{success, error}` body.
    ///
    /// A failed mutation may come back with a 4xx status and a JSON body; the
    /// body wins whenever it parses.
    async fn mutate(&self, path: &str) -> Result<Option<String>> {
        let (status, body) = self.get(path).await?;
        match serde_json::from_str::<MutationResponse>(&body) {
            Ok(response) => response.into_result(),
            Err(_) if !status.is_success() => Err(unexpected(status, &body)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %excerpt(&body),
                    "Failed to parse cart mutation response"
                );
                Err(CartError::Decode(e))
            }
        }
    }
}

#[async_trait]
impl CartApi for HttpCartClient {
    #[instrument(skip(self))]
    async fn count(&self) -> Result<u32> {
        let (status, body) = self.get("api/carrito/contador").await?;
        let response: CountResponse = decode(status, &body)?;
        Ok(response.contador)
    }

    #[instrument(skip(self))]
    async fn detail(&self) -> Result<Vec<LineItem>> {
        let (status, body) = self.get("api/carrito/detalle").await?;
        let rows: Vec<DetailItem> = decode(status, &body)?;
        Ok(rows
            .into_iter()
            .filter_map(DetailItem::into_line_item)
            .collect())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add(&self, product_id: ProductId) -> Result<Option<String>> {
        self.mutate(&format!("api/carrito/agregar/{product_id}"))
            .await
    }

    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    async fn update(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        self.mutate(&format!("api/carrito/actualizar/{product_id}/{quantity}"))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove(&self, product_id: ProductId) -> Result<()> {
        self.mutate(&format!("api/carrito/eliminar/{product_id}"))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ProductLookup for HttpCartClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: ProductId) -> Result<Product> {
        if let Some(product) = self.inner.products.get(&product_id).await {
            debug!("Product cache hit");
            return Ok(product);
        }

        let (status, body) = self.get(&format!("api/productos/{product_id}")).await?;
        if status == StatusCode::NOT_FOUND {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map_or_else(|_| format!("Producto {product_id} no encontrado"), |b| b.error);
            return Err(CartError::NotFound(message));
        }

        let product: Product = decode(status, &body)?;
        self.inner
            .products
            .insert(product_id, product.clone())
            .await;
        Ok(product)
    }
}

/// Decode a successful JSON body.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(unexpected(status, body));
    }

    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %excerpt(body),
            "Failed to parse storefront response"
        );
        CartError::Decode(e)
    })
}

fn unexpected(status: StatusCode, body: &str) -> CartError {
    tracing::error!(
        status = %status,
        body = %excerpt(body),
        "Storefront API returned non-success status"
    );
    CartError::UnexpectedStatus {
        status: status.as_u16(),
        body: excerpt(body),
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let body = "ñ".repeat(500);
        assert_eq!(excerpt(&body).chars().count(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_decode_rejects_error_status() {
        let err = decode::<CountResponse>(StatusCode::INTERNAL_SERVER_ERROR, "boom").unwrap_err();
        assert!(matches!(err, CartError::UnexpectedStatus { status: 500, .. }));
    }

    #[test]
    fn test_decode_reports_bad_json() {
        let err = decode::<CountResponse>(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, CartError::Decode(_)));
    }

    #[test]
    fn test_debug_redacts_cookie() {
        let config = CartConfig::from_vars(|key| match key {
            "TIENDA_BASE_URL" => Some("http://localhost:5000".to_string()),
            "TIENDA_SESSION_COOKIE" => Some("session=very_secret".to_string()),
            _ => None,
        })
        .unwrap();
        let client = HttpCartClient::new(&config);
        assert!(client.has_identity());
        let debug_output = format!("{client:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very_secret"));
    }
}
