//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIENDA_BASE_URL` - Storefront origin serving `/api/carrito/*` and `/api/productos/*`
//!
//! ## Optional
//! - `TIENDA_SESSION_COOKIE` - `Cookie` header value of the logged-in session
//!   (e.g. `session=...`). Its presence marks the session as authenticated.
//! - `TIENDA_CART_BACKEND` - `remote` (default), `auto` or `local`
//! - `TIENDA_CART_PATH` - Local cart store file (default: carrito.json)
//! - `TIENDA_PRODUCT_CACHE_TTL_SECS` - Product lookup cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::session::BackendPolicy;

const DEFAULT_CART_PATH: &str = "carrito.json";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct CartConfig {
    /// Storefront origin, always ending in `/`
    pub base_url: Url,
    /// Session cookie for the server-backed cart
    pub session_cookie: Option<SecretString>,
    /// Which backend to use for which session
    pub backend_policy: BackendPolicy,
    /// Local cart store file
    pub cart_path: PathBuf,
    /// How long product lookups stay cached
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("backend_policy", &self.backend_policy)
            .field("cart_path", &self.cart_path)
            .field("product_cache_ttl", &self.product_cache_ttl)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = get("TIENDA_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("TIENDA_BASE_URL".to_string()))?;
        let base_url = parse_base_url(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("TIENDA_BASE_URL".to_string(), e))?;

        let session_cookie = get("TIENDA_SESSION_COOKIE")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(SecretString::from);

        let backend_policy = match get("TIENDA_CART_BACKEND") {
            Some(value) => value.parse::<BackendPolicy>().map_err(|e| {
                ConfigError::InvalidEnvVar("TIENDA_CART_BACKEND".to_string(), e.to_string())
            })?,
            None => BackendPolicy::default(),
        };

        let cart_path = get("TIENDA_CART_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_CART_PATH), PathBuf::from);

        let ttl_secs = match get("TIENDA_PRODUCT_CACHE_TTL_SECS") {
            Some(value) => value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "TIENDA_PRODUCT_CACHE_TTL_SECS".to_string(),
                    e.to_string(),
                )
            })?,
            None => DEFAULT_PRODUCT_CACHE_TTL_SECS,
        };

        Ok(Self {
            base_url,
            session_cookie,
            backend_policy,
            cart_path,
            product_cache_ttl: Duration::from_secs(ttl_secs),
            sentry_dsn: get("SENTRY_DSN"),
            sentry_environment: get("SENTRY_ENVIRONMENT"),
        })
    }

    /// Whether a session cookie was supplied.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session_cookie.is_some()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the storefront origin and make sure it ends in `/` so endpoint
/// paths join beneath it instead of replacing its last segment.
fn parse_base_url(value: &str) -> Result<Url, String> {
    let mut url = Url::parse(value.trim()).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("must be an absolute http(s) URL".to_string());
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
