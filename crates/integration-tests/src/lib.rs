//! End-to-end tests for the Tienda cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```
//!
//! # Stub Storefront
//!
//! [`StubStorefront`] serves the storefront's cart and product endpoints from
//! memory on an ephemeral port, so the real `reqwest` client and the cart
//! manager are exercised over HTTP. Stock is enforced the way the storefront
//! enforces it, including the prose "Solo quedan N unidades" rejection.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tienda_cart::CartConfig;
use tienda_cart::surface::RecordingSurface;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Cookie the stub accepts as a logged-in shopper.
pub const SESSION_COOKIE: &str = "session=shopper-42";

/// Product in the stub catalog.
#[derive(Debug, Clone, Serialize)]
pub struct StubProduct {
    pub id: i32,
    pub nombre: String,
    pub descripcion: String,
    pub precio: f64,
    pub categoria: String,
    pub stock: u32,
    pub imagen: String,
}

impl StubProduct {
    #[must_use]
    pub fn new(id: i32, nombre: &str, categoria: &str, precio: f64, stock: u32) -> Self {
        Self {
            id,
            nombre: nombre.to_string(),
            descripcion: format!("{nombre} de prueba"),
            precio,
            categoria: categoria.to_string(),
            stock,
            imagen: format!("producto{id}.jpg"),
        }
    }
}

/// Default catalog used by most tests.
#[must_use]
pub fn catalog() -> Vec<StubProduct> {
    vec![
        StubProduct::new(1, "Teclado Mecánico", "Periféricos", 80.0, 10),
        StubProduct::new(2, "Mouse Inalámbrico", "Periféricos", 25.5, 10),
        StubProduct::new(3, "SSD 1TB", "Almacenamiento", 120.0, 3),
        StubProduct::new(4, "Monitor 27\"", "Monitores", 350.0, 0),
    ]
}

/// How the stub answers edge cases.
#[derive(Debug, Clone, Default)]
pub struct StubOptions {
    /// Send `{kind: "stock_limit", available}` instead of prose.
    pub structured_stock_errors: bool,
    /// Send `contador` as a string.
    pub counter_as_string: bool,
}

#[derive(Debug, Default)]
struct StubState {
    products: Vec<StubProduct>,
    /// Lines in insertion order: product id and quantity.
    cart: Vec<(i32, u32)>,
    /// Products whose next removal fails once.
    failing_removals: HashSet<i32>,
    options: StubOptions,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<StubState>>;

/// In-memory storefront served over HTTP.
pub struct StubStorefront {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl Drop for StubStorefront {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl StubStorefront {
    /// Start serving `products` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start(products: Vec<StubProduct>, options: StubOptions) -> Self {
        let state: Shared = Arc::new(Mutex::new(StubState {
            products,
            options,
            ..StubState::default()
        }));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub storefront");
        let addr = listener.local_addr().expect("Stub storefront has no address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a line in the server cart.
    pub fn seed_cart(&self, product_id: i32, quantity: u32) {
        let mut state = self.state();
        state.cart.retain(|(id, _)| *id != product_id);
        state.cart.push((product_id, quantity));
    }

    /// Make the next removal of `product_id` fail.
    pub fn fail_next_removal(&self, product_id: i32) {
        self.state().failing_removals.insert(product_id);
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: i32) -> Option<u32> {
        self.state()
            .cart
            .iter()
            .find(|(id, _)| *id == product_id)
            .map(|(_, q)| *q)
    }

    #[must_use]
    pub fn cart_len(&self) -> usize {
        self.state().cart.len()
    }

    /// Paths requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    /// Requests whose path starts with `prefix`.
    #[must_use]
    pub fn requests_to(&self, prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|path| path.starts_with(prefix))
            .collect()
    }

    /// Client configuration pointing at this stub.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is rejected.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn config(&self, cookie: Option<&str>, backend: &str, cart_path: &FsPath) -> CartConfig {
        config_for(&self.base_url(), cookie, backend, cart_path).expect("Invalid stub config")
    }
}

/// Build a configuration through the same lookup the environment uses.
///
/// # Errors
///
/// Returns the configuration error for invalid values.
pub fn config_for(
    base_url: &str,
    cookie: Option<&str>,
    backend: &str,
    cart_path: &FsPath,
) -> Result<CartConfig, tienda_cart::config::ConfigError> {
    CartConfig::from_vars(|key| match key {
        "TIENDA_BASE_URL" => Some(base_url.to_string()),
        "TIENDA_SESSION_COOKIE" => cookie.map(str::to_string),
        "TIENDA_CART_BACKEND" => Some(backend.to_string()),
        "TIENDA_CART_PATH" => Some(cart_path.display().to_string()),
        _ => None,
    })
}

/// A cart file path unique to one test.
#[must_use]
pub fn temp_cart_path() -> PathBuf {
    std::env::temp_dir().join(format!("tienda-it-{}.json", uuid::Uuid::new_v4()))
}

/// Surface that confirms every prompt.
#[must_use]
pub fn surface() -> Arc<RecordingSurface> {
    Arc::new(RecordingSurface::new(true))
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/carrito/contador", get(count))
        .route("/api/carrito/detalle", get(detail))
        .route("/api/carrito/agregar/{id}", get(add))
        .route("/api/carrito/actualizar/{id}/{qty}", get(update))
        .route("/api/carrito/eliminar/{id}", get(remove))
        .route("/api/productos", get(products))
        .route("/api/productos/{id}", get(product))
        .with_state(state)
}

fn lock(state: &Shared) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record the request and check the session cookie.
fn authorize(state: &mut StubState, headers: &HeaderMap, path: String) -> Result<(), Response> {
    state.requests.push(path);

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    if cookie == Some(SESSION_COOKIE) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "No autorizado"})),
        )
            .into_response())
    }
}

fn rejected(status: StatusCode, error: Value) -> Response {
    (status, Json(json!({"success": false, "error": error}))).into_response()
}

fn stock_error(options: &StubOptions, available: u32) -> Value {
    let message = format!("Solo quedan {available} unidades disponibles");
    if options.structured_stock_errors {
        json!({"kind": "stock_limit", "available": available, "message": message})
    } else {
        Value::String(message)
    }
}

async fn count(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authorize(&mut state, &headers, "/api/carrito/contador".into()) {
        return response;
    }

    let total: u32 = state.cart.iter().map(|(_, q)| q).sum();
    if state.options.counter_as_string {
        Json(json!({"contador": total.to_string()})).into_response()
    } else {
        Json(json!({"contador": total})).into_response()
    }
}

async fn detail(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authorize(&mut state, &headers, "/api/carrito/detalle".into()) {
        return response;
    }

    let rows: Vec<Value> = state
        .cart
        .iter()
        .filter_map(|(id, quantity)| {
            let product = state.products.iter().find(|p| p.id == *id)?;
            Some(json!({
                "producto_id": product.id,
                "nombre": product.nombre,
                "categoria": product.categoria,
                // Prices come back as decimal strings from the database driver
                "precio": format!("{:.2}", product.precio),
                "cantidad": quantity,
                "imagen": product.imagen,
            }))
        })
        .collect();
    Json(Value::Array(rows)).into_response()
}

async fn add(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i32>) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authorize(&mut state, &headers, format!("/api/carrito/agregar/{id}")) {
        return response;
    }

    let Some(stock) = state.products.iter().find(|p| p.id == id).map(|p| p.stock) else {
        return rejected(StatusCode::NOT_FOUND, json!("Producto no encontrado"));
    };

    let current = state
        .cart
        .iter()
        .find(|(pid, _)| *pid == id)
        .map_or(0, |(_, q)| *q);
    if current + 1 > stock {
        let error = stock_error(&state.options, stock);
        return rejected(StatusCode::OK, error);
    }

    match state.cart.iter_mut().find(|(pid, _)| *pid == id) {
        Some(line) => line.1 += 1,
        None => state.cart.push((id, 1)),
    }
    Json(json!({"success": true, "message": "Producto agregado al carrito"})).into_response()
}

async fn update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, qty)): Path<(i32, i64)>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authorize(
        &mut state,
        &headers,
        format!("/api/carrito/actualizar/{id}/{qty}"),
    ) {
        return response;
    }

    let Ok(qty) = u32::try_from(qty) else {
        return rejected(StatusCode::BAD_REQUEST, json!("Cantidad inválida"));
    };
    if qty == 0 {
        return rejected(StatusCode::BAD_REQUEST, json!("Cantidad inválida"));
    }

    let Some(stock) = state.products.iter().find(|p| p.id == id).map(|p| p.stock) else {
        return rejected(StatusCode::NOT_FOUND, json!("Producto no encontrado"));
    };
    if qty > stock {
        let error = stock_error(&state.options, stock);
        return rejected(StatusCode::OK, error);
    }

    match state.cart.iter_mut().find(|(pid, _)| *pid == id) {
        Some(line) => {
            line.1 = qty;
            Json(json!({"success": true})).into_response()
        }
        None => rejected(StatusCode::NOT_FOUND, json!("Producto no está en el carrito")),
    }
}

async fn remove(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i32>) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authorize(&mut state, &headers, format!("/api/carrito/eliminar/{id}")) {
        return response;
    }

    if state.failing_removals.remove(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }

    state.cart.retain(|(pid, _)| *pid != id);
    Json(json!({"success": true})).into_response()
}

async fn products(State(state): State<Shared>) -> Response {
    let mut state = lock(&state);
    state.requests.push("/api/productos".into());
    Json(state.products.clone()).into_response()
}

async fn product(State(state): State<Shared>, Path(id): Path<i32>) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("/api/productos/{id}"));

    match state.products.iter().find(|p| p.id == id) {
        Some(product) => Json(product.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Producto no encontrado"})),
        )
            .into_response(),
    }
}
