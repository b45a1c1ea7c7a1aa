//! Unified error handling with Sentry integration.
//!
//! Every cart operation resolves to a [`CartError`] at its boundary. The
//! manager turns errors into shopper notifications via
//! [`CartError::user_message`]; infrastructure failures are additionally
//! captured to Sentry through [`report`].

use thiserror::Error;
use tienda_core::{AmountOverflow, QuantityError};

use crate::store::StoreError;

/// Cart-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Network failure talking to the storefront API.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The storefront answered with a status and body we cannot interpret.
    #[error("Unexpected response (HTTP {status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Storefront base URL could not be joined with an endpoint path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A quantity outside the valid range.
    #[error("Invalid quantity: {0}")]
    Validation(#[from] QuantityError),

    /// Prices and quantities in the cart add up to an unrepresentable amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountOverflow),

    /// The server refused the quantity because of limited stock.
    #[error("Stock limit: {available} available ({message})")]
    StockLimit { available: u32, message: String },

    /// The remote cart was used without an authenticated identity.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The server rejected the mutation for a reason other than stock.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Product or cart line does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local persisted store failed.
    #[error("Store error: {0}")]
    Storage(#[from] StoreError),

    /// Template rendering failed.
    #[error("Render error: {0}")]
    Render(#[from] askama::Error),
}

impl CartError {
    /// Whether this error came from the transport rather than a server decision.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::UnexpectedStatus { .. } | Self::Decode(_)
        )
    }

    /// Whether this error is a fault on our side or the wire's, as opposed to
    /// a decision the server or the shopper made.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        self.is_transport()
            || matches!(
                self,
                Self::InvalidUrl(_) | Self::InvalidAmount(_) | Self::Storage(_) | Self::Render(_)
            )
    }

    /// Message suitable for a shopper-facing notification.
    ///
    /// Server-provided messages are shown verbatim; infrastructure details are
    /// never exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::UnexpectedStatus { .. } | Self::Decode(_) => {
                "Error de conexión con la tienda".to_string()
            }
            Self::InvalidUrl(_) | Self::Render(_) => "Error interno del carrito".to_string(),
            Self::Storage(_) => "No se pudo guardar el carrito".to_string(),
            Self::InvalidAmount(_) => "El carrito contiene importes no válidos".to_string(),
            Self::Validation(_) => "La cantidad debe ser al menos 1".to_string(),
            Self::StockLimit { message, .. }
            | Self::Rejected(message)
            | Self::NotFound(message) => message.clone(),
            Self::NotAuthenticated => "Inicia sesión para continuar".to_string(),
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Log an error and, for infrastructure failures, capture it to Sentry.
pub fn report(err: &CartError, operation: &str) {
    if err.is_infrastructure() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            operation,
            sentry_event_id = %event_id,
            "Cart operation failed"
        );
    } else {
        tracing::warn!(error = %err, operation, "Cart operation rejected");
    }
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "set_quantity", Some(&[("product_id", "3"), ("quantity", "5")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::NotFound("producto 9".to_string());
        assert_eq!(err.to_string(), "Not found: producto 9");

        let err = CartError::StockLimit {
            available: 3,
            message: "Solo quedan 3 unidades".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stock limit: 3 available (Solo quedan 3 unidades)"
        );
    }

    #[test]
    fn test_user_message_hides_infrastructure_details() {
        let err = CartError::UnexpectedStatus {
            status: 500,
            body: "Traceback (most recent call last)".to_string(),
        };
        assert!(err.is_transport());
        assert!(!err.user_message().contains("Traceback"));
    }

    #[test]
    fn test_user_message_passes_server_text_through() {
        let err = CartError::Rejected("Producto sin stock".to_string());
        assert!(!err.is_transport());
        assert_eq!(err.user_message(), "Producto sin stock");

        let err = CartError::NotFound("Producto no encontrado".to_string());
        assert!(!err.is_infrastructure());
        assert_eq!(err.user_message(), "Producto no encontrado");
    }

    #[test]
    fn test_invalid_amount_is_infrastructure() {
        let err = CartError::from(AmountOverflow);
        assert!(err.is_infrastructure());
        assert!(!err.is_transport());
        assert_eq!(err.user_message(), "El carrito contiene importes no válidos");
    }
}
