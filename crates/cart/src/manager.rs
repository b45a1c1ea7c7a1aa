//! Cart state manager.
//!
//! [`CartStateManager`] is the single entry point for cart mutations. Each
//! operation runs to a terminal state, re-renders the cart region and badge
//! from the backend's authoritative list, and then tells the shopper what
//! happened.
//!
//! ```text
//! Idle -> InFlight -> Applied
//!                  -> Rejected(stock limit) -> Reapplied
//!                  -> Rejected(other)       -> Reverted
//! ```

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tienda_core::{LineItem, ProductId, Quantity, Totals, item_count};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::HttpCartClient;
use crate::backend::{Backend, LocalCart, not_in_cart};
use crate::config::CartConfig;
use crate::error::{CartError, Result, add_breadcrumb, report};
use crate::locks::KeyedLocks;
use crate::session::{BackendKind, CART_PAGE_PATH, CartSession};
use crate::store::JsonFileStore;
use crate::surface::{Notification, Surface};
use crate::view::{self, RowMap};

/// Where the host navigates once checkout may proceed.
pub const CHECKOUT_PATH: &str = "/checkout";

/// Where the host sends shoppers who must log in.
pub const LOGIN_PATH: &str = "/login";

const MSG_ADDED: &str = "Producto agregado al carrito";
const MSG_UPDATED: &str = "Cantidad actualizada";
const MSG_REMOVED: &str = "Producto eliminado";
const MSG_CLEARED: &str = "Carrito vaciado";
const MSG_LOGIN_TO_ADD: &str = "Inicia sesión para agregar productos al carrito";
const MSG_LOGIN_TO_EDIT: &str = "Inicia sesión para modificar tu carrito";
const MSG_LOGIN_TO_CHECKOUT: &str = "Inicia sesión para proceder al pago";
const MSG_EMPTY_CART: &str = "Tu carrito está vacío";
const MSG_LOAD_FAILED: &str = "Error al cargar el carrito";
const MSG_ADD_FAILED: &str = "Error al agregar producto";
const MSG_UPDATE_FAILED: &str = "Error al actualizar la cantidad";
const MSG_REMOVE_FAILED: &str = "Error al eliminar producto";
const MSG_CLEAR_FAILED: &str = "Error al vaciar el carrito";

const CONFIRM_REMOVE: &str = "¿Eliminar este producto del carrito?";
const CONFIRM_CLEAR: &str = "¿Estás seguro de que quieres vaciar el carrito?";

/// Terminal state of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend accepted the change as requested.
    Applied,
    /// The server capped the quantity and the capped value was applied.
    Reapplied { available: u32 },
    /// The change was rejected or failed; the cart shows the backend's state.
    Reverted,
    /// The shopper declined the confirmation prompt.
    Cancelled,
    /// The server cart needs a logged-in shopper.
    LoginRequired,
    /// A clear removed some lines but not all of them.
    Partial { failed: usize },
}

/// What the host should do after a checkout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutDecision {
    Login,
    EmptyCart,
    Proceed,
}

impl CheckoutDecision {
    /// Path to navigate to, if any.
    #[must_use]
    pub const fn redirect(self) -> Option<&'static str> {
        match self {
            Self::Login => Some(LOGIN_PATH),
            Self::Proceed => Some(CHECKOUT_PATH),
            Self::EmptyCart => None,
        }
    }
}

/// Authoritative cart state as last rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub item_count: u32,
}

impl CartSnapshot {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            totals: Totals::EMPTY,
            item_count: 0,
        }
    }
}

/// Single entry point for cart mutations.
pub struct CartStateManager {
    session: CartSession,
    backend: Backend,
    surface: Arc<dyn Surface>,
    locks: KeyedLocks,
    /// Held from fetching the authoritative list until it is on screen.
    render: Mutex<()>,
    rows: StdMutex<RowMap>,
}

impl std::fmt::Debug for CartStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStateManager")
            .field("session", &self.session)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl CartStateManager {
    #[must_use]
    pub fn new(session: CartSession, backend: Backend, surface: Arc<dyn Surface>) -> Self {
        Self {
            session,
            backend,
            surface,
            locks: KeyedLocks::new(),
            render: Mutex::new(()),
            rows: StdMutex::new(RowMap::default()),
        }
    }

    /// Wire a manager from configuration: session from the cookie, backend
    /// from the policy, local store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store exists but cannot be read.
    pub fn from_config(config: &CartConfig, surface: Arc<dyn Surface>) -> Result<Self> {
        let session = CartSession::new(config.is_authenticated());
        let client = Arc::new(HttpCartClient::new(config));

        let backend = match config.backend_policy.select(session) {
            BackendKind::Remote => Backend::remote(client),
            BackendKind::Local => {
                let store = Arc::new(JsonFileStore::new(&config.cart_path));
                Backend::local(LocalCart::open(store)?, client)
            }
        };

        info!(
            backend = ?backend.kind(),
            authenticated = session.is_authenticated(),
            "Cart manager ready"
        );
        Ok(Self::new(session, backend, surface))
    }

    #[must_use]
    pub const fn session(&self) -> CartSession {
        self.session
    }

    #[must_use]
    pub const fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Rows as last rendered.
    #[must_use]
    pub fn rows(&self) -> RowMap {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn requires_login(&self) -> bool {
        self.backend.kind() == BackendKind::Remote && !self.session.is_authenticated()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of a product.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId) -> MutationOutcome {
        let id = product_id.to_string();
        add_breadcrumb("cart", "add", Some(&[("product_id", id.as_str())]));

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_ADD));
            return MutationOutcome::LoginRequired;
        }

        let _guard = self.locks.lock(product_id).await;

        let (outcome, notice) = match &self.backend {
            Backend::Local { cart, products } => match products.product(product_id).await {
                Ok(product) => match cart.lock().await.add(product.to_line_item()) {
                    Ok(quantity) => {
                        debug!(quantity = quantity.get(), "Added to local cart");
                        (MutationOutcome::Applied, Notification::success(MSG_ADDED))
                    }
                    Err(e) => Self::fail("add", &e, MSG_ADD_FAILED, MSG_LOGIN_TO_ADD),
                },
                // Lookup failed: nothing was mutated
                Err(e) => Self::fail("add", &e, MSG_ADD_FAILED, MSG_LOGIN_TO_ADD),
            },
            Backend::Remote(remote) => match remote.add(product_id).await {
                Ok(message) => (
                    MutationOutcome::Applied,
                    Notification::success(message.unwrap_or_else(|| MSG_ADDED.to_string())),
                ),
                Err(e) => Self::fail("add", &e, MSG_ADD_FAILED, MSG_LOGIN_TO_ADD),
            },
        };

        self.settle(outcome, notice).await
    }

    /// Set a line's quantity. Values below 1 become 1.
    ///
    /// When the server caps the quantity at the available stock, the capped
    /// value is resubmitted and the shopper is told the new quantity.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, requested: i64) -> MutationOutcome {
        let quantity = Quantity::clamped(requested);
        if i64::from(quantity.get()) != requested {
            debug!(requested, quantity = quantity.get(), "Quantity clamped");
        }
        let (id, qty) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "set_quantity",
            Some(&[("product_id", id.as_str()), ("quantity", qty.as_str())]),
        );

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_EDIT));
            return MutationOutcome::LoginRequired;
        }

        let _guard = self.locks.lock(product_id).await;
        let (outcome, notice) = self.apply_quantity(product_id, quantity).await;
        self.settle(outcome, notice).await
    }

    /// Adjust a line by `delta` relative to the quantity on screen.
    ///
    /// The displayed quantity is read under the product's lock, so rapid
    /// repeated adjustments compose instead of overwriting each other.
    #[instrument(skip(self))]
    pub async fn change_quantity_by(&self, product_id: ProductId, delta: i64) -> MutationOutcome {
        let (id, step) = (product_id.to_string(), delta.to_string());
        add_breadcrumb(
            "cart",
            "change_quantity_by",
            Some(&[("product_id", id.as_str()), ("delta", step.as_str())]),
        );

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_EDIT));
            return MutationOutcome::LoginRequired;
        }

        let _guard = self.locks.lock(product_id).await;

        let mut displayed = self.rows().displayed_quantity(product_id);
        if displayed.is_none() {
            debug!("No row on screen, refreshing");
            self.rerender_or_notify().await;
            displayed = self.rows().displayed_quantity(product_id);
        }

        let Some(current) = displayed else {
            let err = not_in_cart(product_id);
            let (outcome, notice) = Self::fail(
                "change_quantity_by",
                &err,
                MSG_UPDATE_FAILED,
                MSG_LOGIN_TO_EDIT,
            );
            self.surface.notify(notice);
            return outcome;
        };

        let (outcome, notice) = self.apply_quantity(product_id, current.offset(delta)).await;
        self.settle(outcome, notice).await
    }

    /// Remove a line after the shopper confirms.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> MutationOutcome {
        let id = product_id.to_string();
        add_breadcrumb("cart", "remove", Some(&[("product_id", id.as_str())]));

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_EDIT));
            return MutationOutcome::LoginRequired;
        }
        if !self.surface.confirm(CONFIRM_REMOVE) {
            return MutationOutcome::Cancelled;
        }

        let _guard = self.locks.lock(product_id).await;

        let result = match &self.backend {
            Backend::Local { cart, .. } => cart.lock().await.remove(product_id),
            Backend::Remote(remote) => remote.remove(product_id).await,
        };
        let (outcome, notice) = match result {
            Ok(()) => (MutationOutcome::Applied, Notification::success(MSG_REMOVED)),
            Err(e) => Self::fail("remove", &e, MSG_REMOVE_FAILED, MSG_LOGIN_TO_EDIT),
        };

        self.settle(outcome, notice).await
    }

    /// Remove every line after the shopper confirms.
    ///
    /// The server cart is emptied one line at a time; lines that fail to go
    /// away are counted and the rest are still removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> MutationOutcome {
        add_breadcrumb("cart", "clear", None);

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_EDIT));
            return MutationOutcome::LoginRequired;
        }
        if !self.surface.confirm(CONFIRM_CLEAR) {
            return MutationOutcome::Cancelled;
        }

        let _guard = self.locks.lock_all().await;

        let (outcome, notice) = match &self.backend {
            Backend::Local { cart, .. } => match cart.lock().await.clear() {
                Ok(()) => (MutationOutcome::Applied, Notification::success(MSG_CLEARED)),
                Err(e) => Self::fail("clear", &e, MSG_CLEAR_FAILED, MSG_LOGIN_TO_EDIT),
            },
            Backend::Remote(remote) => match remote.clear().await {
                Ok(cleared) if cleared.is_complete() => {
                    info!(removed = cleared.removed.len(), "Cart cleared");
                    (MutationOutcome::Applied, Notification::success(MSG_CLEARED))
                }
                Ok(cleared) => {
                    let failed = cleared.failed.len();
                    warn!(
                        removed = cleared.removed.len(),
                        failed, "Cart partially cleared"
                    );
                    (
                        MutationOutcome::Partial { failed },
                        Notification::warning(format!(
                            "No se pudieron eliminar {failed} producto(s) del carrito"
                        )),
                    )
                }
                Err(e) => Self::fail("clear", &e, MSG_CLEAR_FAILED, MSG_LOGIN_TO_EDIT),
            },
        };

        self.settle(outcome, notice).await
    }

    // =========================================================================
    // Queries and host contract
    // =========================================================================

    /// Sum of quantities. Zero for a server cart with no logged-in shopper.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    #[instrument(skip(self))]
    pub async fn item_count(&self) -> Result<u32> {
        match &self.backend {
            _ if self.requires_login() => Ok(0),
            Backend::Local { cart, .. } => Ok(item_count(cart.lock().await.items())),
            Backend::Remote(remote) => remote.count().await,
        }
    }

    /// Totals computed from the authoritative item list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried or the amounts are
    /// out of range.
    #[instrument(skip(self))]
    pub async fn totals(&self) -> Result<Totals> {
        if self.requires_login() {
            return Ok(Totals::EMPTY);
        }
        let items = self.backend.items().await?;
        Ok(Totals::from_items(&items)?)
    }

    /// Page-load hook: update the badge, and render the cart region when
    /// `path` is the cart page.
    #[instrument(skip(self))]
    pub async fn load(&self, path: &str) {
        let on_cart_page = path.trim_end_matches('/') == CART_PAGE_PATH;

        if on_cart_page {
            self.rerender_or_notify().await;
            return;
        }

        match self.item_count().await {
            Ok(count) => self.show_badge(count),
            Err(e) => {
                report(&e, "load");
                self.show_badge(0);
            }
        }
    }

    /// Decide whether checkout may proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be loaded.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<CheckoutDecision> {
        add_breadcrumb("cart", "checkout", None);

        if self.requires_login() {
            self.surface.notify(Notification::warning(MSG_LOGIN_TO_CHECKOUT));
            return Ok(CheckoutDecision::Login);
        }

        let items = match self.backend.items().await {
            Ok(items) => items,
            Err(CartError::NotAuthenticated) => {
                warn!("Session rejected by the server");
                self.surface.notify(Notification::warning(MSG_LOGIN_TO_CHECKOUT));
                return Ok(CheckoutDecision::Login);
            }
            Err(e) => {
                report(&e, "checkout");
                self.surface.notify(Notification::danger(MSG_LOAD_FAILED));
                return Err(e);
            }
        };

        if items.is_empty() {
            self.surface.notify(Notification::danger(MSG_EMPTY_CART));
            return Ok(CheckoutDecision::EmptyCart);
        }
        Ok(CheckoutDecision::Proceed)
    }

    /// Re-render the cart region and badge from the authoritative list.
    ///
    /// A server cart without a valid session shows the login placeholder and
    /// an empty badge, whether the session was missing up front or the
    /// server rejected it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried, the amounts are out
    /// of range, or a template fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartSnapshot> {
        let _render = self.render.lock().await;

        if self.requires_login() {
            return self.show_login_required();
        }

        let items = match self.backend.items().await {
            Ok(items) => items,
            Err(CartError::NotAuthenticated) => {
                warn!("Session rejected by the server");
                return self.show_login_required();
            }
            Err(e) => return Err(e),
        };
        let totals = Totals::from_items(&items)?;
        let count = item_count(&items);

        let rendered = view::render_cart(&items, &totals)?;
        let badge = view::render_badge(count)?;

        self.surface.render_cart(&rendered.markup);
        self.surface.render_badge(count, &badge);
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rendered.rows;

        debug!(lines = items.len(), count, "Cart rendered");
        Ok(CartSnapshot {
            items,
            totals,
            item_count: count,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Login placeholder, empty badge, no rows. Caller holds the render lock.
    fn show_login_required(&self) -> Result<CartSnapshot> {
        let markup = view::render_login_required()?;
        self.surface.render_cart(&markup);
        self.show_badge(0);
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = RowMap::default();
        Ok(CartSnapshot::empty())
    }

    /// Apply `quantity` with the product's lock already held.
    async fn apply_quantity(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> (MutationOutcome, Notification) {
        let remote = match &self.backend {
            Backend::Local { cart, .. } => {
                return match cart.lock().await.set_quantity(product_id, quantity) {
                    Ok(()) => (MutationOutcome::Applied, Notification::success(MSG_UPDATED)),
                    Err(e) => {
                        Self::fail("set_quantity", &e, MSG_UPDATE_FAILED, MSG_LOGIN_TO_EDIT)
                    }
                };
            }
            Backend::Remote(remote) => remote,
        };

        match remote.set_quantity(product_id, quantity).await {
            Ok(()) => (MutationOutcome::Applied, Notification::success(MSG_UPDATED)),
            Err(CartError::StockLimit { available, message }) => {
                warn!(
                    requested = quantity.get(),
                    available, "Server capped quantity at available stock"
                );
                self.surface.notify(Notification::warning(message));

                // Nothing left to resubmit; the refresh shows what the server kept
                let Ok(capped) = Quantity::new(i64::from(available)) else {
                    return (
                        MutationOutcome::Reverted,
                        Notification::danger(MSG_UPDATE_FAILED),
                    );
                };

                match remote.set_quantity(product_id, capped).await {
                    Ok(()) => (
                        MutationOutcome::Reapplied { available },
                        Notification::info(format!(
                            "Cantidad ajustada al stock disponible: {available}"
                        )),
                    ),
                    Err(e) => {
                        Self::fail("set_quantity", &e, MSG_UPDATE_FAILED, MSG_LOGIN_TO_EDIT)
                    }
                }
            }
            Err(e) => Self::fail("set_quantity", &e, MSG_UPDATE_FAILED, MSG_LOGIN_TO_EDIT),
        }
    }

    /// Report a failed step and pick the notification for it.
    ///
    /// `fallback` replaces infrastructure details; `login` is shown when the
    /// server rejected the session.
    fn fail(
        operation: &str,
        err: &CartError,
        fallback: &str,
        login: &str,
    ) -> (MutationOutcome, Notification) {
        report(err, operation);

        if matches!(err, CartError::NotAuthenticated) {
            return (MutationOutcome::LoginRequired, Notification::warning(login));
        }

        let text = if err.is_infrastructure() {
            fallback.to_string()
        } else {
            err.user_message()
        };
        (MutationOutcome::Reverted, Notification::danger(text))
    }

    /// Terminal step of every mutation: re-render, then notify.
    async fn settle(&self, outcome: MutationOutcome, notice: Notification) -> MutationOutcome {
        self.rerender_or_notify().await;
        self.surface.notify(notice);
        outcome
    }

    async fn rerender_or_notify(&self) -> Option<CartSnapshot> {
        match self.refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                report(&e, "refresh");
                self.surface.notify(Notification::danger(MSG_LOAD_FAILED));
                None
            }
        }
    }

    fn show_badge(&self, count: u32) {
        match view::render_badge(count) {
            Ok(markup) => self.surface.render_badge(count, &markup),
            Err(e) => report(&CartError::from(e), "render_badge"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use tienda_core::Price;

    use super::*;
    use crate::api::{CartApi, Product, ProductLookup};
    use crate::store::MemoryStore;
    use crate::surface::{Level, RecordingSurface};

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeState {
        items: Vec<LineItem>,
        stock: HashMap<ProductId, u32>,
        failing_removals: HashSet<ProductId>,
        fail_updates: bool,
        session_expired: bool,
        updates: Vec<(ProductId, u32)>,
        removals: Vec<ProductId>,
    }

    /// Server cart held in memory, enforcing stock like the storefront does.
    #[derive(Default)]
    struct FakeApi {
        state: StdMutex<FakeState>,
    }

    impl FakeApi {
        fn with_stock(stock: &[(i32, u32)]) -> Self {
            let api = Self::default();
            api.state().stock = stock
                .iter()
                .map(|(id, n)| (ProductId::new(*id), *n))
                .collect();
            api
        }

        fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
            self.state.lock().unwrap()
        }

        fn check_session(&self) -> Result<()> {
            if self.state().session_expired {
                return Err(CartError::NotAuthenticated);
            }
            Ok(())
        }

        fn quantity_of(&self, id: i32) -> Option<u32> {
            self.state()
                .items
                .iter()
                .find(|i| i.product_id == ProductId::new(id))
                .map(|i| i.quantity.get())
        }
    }

    #[async_trait]
    impl CartApi for FakeApi {
        async fn count(&self) -> Result<u32> {
            self.check_session()?;
            Ok(item_count(&self.state().items))
        }

        async fn detail(&self) -> Result<Vec<LineItem>> {
            tokio::task::yield_now().await;
            self.check_session()?;
            Ok(self.state().items.clone())
        }

        async fn add(&self, product_id: ProductId) -> Result<Option<String>> {
            self.check_session()?;
            let mut state = self.state();
            if let Some(line) = state.items.iter_mut().find(|i| i.product_id == product_id) {
                line.quantity = line.quantity.increment();
            } else {
                state.items.push(item(product_id.as_i32(), 1_000, 1));
            }
            Ok(Some("Producto agregado".to_string()))
        }

        async fn update(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
            tokio::task::yield_now().await;
            self.check_session()?;
            let mut state = self.state();
            state.updates.push((product_id, quantity.get()));

            if state.fail_updates {
                return Err(CartError::UnexpectedStatus {
                    status: 502,
                    body: "Bad Gateway".to_string(),
                });
            }
            if let Some(&available) = state.stock.get(&product_id) {
                if quantity.get() > available {
                    return Err(CartError::StockLimit {
                        available,
                        message: format!("Solo quedan {available} unidades"),
                    });
                }
            }
            let line = state
                .items
                .iter_mut()
                .find(|i| i.product_id == product_id)
                .ok_or_else(|| not_in_cart(product_id))?;
            line.quantity = quantity;
            Ok(())
        }

        async fn remove(&self, product_id: ProductId) -> Result<()> {
            self.check_session()?;
            let mut state = self.state();
            state.removals.push(product_id);
            if state.failing_removals.contains(&product_id) {
                return Err(CartError::Rejected("No se pudo eliminar".to_string()));
            }
            state.items.retain(|i| i.product_id != product_id);
            Ok(())
        }
    }

    struct FakeCatalog;

    #[async_trait]
    impl ProductLookup for FakeCatalog {
        async fn product(&self, product_id: ProductId) -> Result<Product> {
            if product_id.as_i32() > 100 {
                return Err(CartError::NotFound("Producto no encontrado".to_string()));
            }
            Ok(Product {
                id: product_id,
                nombre: format!("Producto {product_id}"),
                descripcion: None,
                precio: Price::from_cents(4_500),
                categoria: Some("Periféricos".to_string()),
                stock: Some(10),
                imagen: Some(format!("p{product_id}.jpg")),
            })
        }
    }

    fn item(id: i32, cents: i64, qty: i64) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: format!("Producto {id}"),
            unit_price: Price::from_cents(cents),
            quantity: Quantity::new(qty).unwrap(),
            image_ref: format!("p{id}.jpg"),
            category: "Periféricos".to_string(),
        }
    }

    fn remote(
        api: &Arc<FakeApi>,
        session: CartSession,
    ) -> (CartStateManager, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let backend = Backend::remote(api.clone());
        (
            CartStateManager::new(session, backend, surface.clone()),
            surface,
        )
    }

    fn local(store: Arc<MemoryStore>) -> (CartStateManager, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let cart = LocalCart::open(store).unwrap();
        let backend = Backend::local(cart, Arc::new(FakeCatalog));
        (
            CartStateManager::new(CartSession::anonymous(), backend, surface.clone()),
            surface,
        )
    }

    // -------------------------------------------------------------------------
    // Local backend
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_local_repeated_add_accumulates() {
        let store = Arc::new(MemoryStore::new());
        let (manager, surface) = local(store.clone());
        let id = ProductId::new(5);

        for _ in 0..3 {
            assert_eq!(manager.add(id).await, MutationOutcome::Applied);
        }
        for _ in 0..4 {
            manager.add(id).await;
        }

        assert_eq!(store.saved()[0].quantity.get(), 7);
        assert_eq!(manager.item_count().await.unwrap(), 7);
        assert_eq!(surface.badge(), Some(7));
        assert!(surface.notified(MSG_ADDED));
    }

    #[tokio::test]
    async fn test_local_add_with_unknown_product_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (manager, surface) = local(store.clone());

        let outcome = manager.add(ProductId::new(404)).await;

        assert_eq!(outcome, MutationOutcome::Reverted);
        assert!(store.saved().is_empty());
        let last = surface.notifications().pop().unwrap();
        assert_eq!(last.text, "Producto no encontrado");
        assert_eq!(last.level, Level::Danger);
    }

    #[tokio::test]
    async fn test_local_set_quantity_zero_becomes_one() {
        let store = Arc::new(MemoryStore::with_items(vec![item(1, 1_000, 4)]));
        let (manager, _surface) = local(store.clone());

        let outcome = manager.set_quantity(ProductId::new(1), 0).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(store.saved()[0].quantity.get(), 1);
    }

    #[tokio::test]
    async fn test_local_totals() {
        let store = Arc::new(MemoryStore::with_items(vec![
            item(1, 15_000, 1),
            item(2, 6_000, 1),
        ]));
        let (manager, _surface) = local(store);

        let totals = manager.totals().await.unwrap();
        assert_eq!(totals.subtotal, Price::from_units(210));
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total, Price::from_units(210));
    }

    // -------------------------------------------------------------------------
    // Remote backend
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_stock_limit_is_reapplied() {
        let api = Arc::new(FakeApi::with_stock(&[(7, 3)]));
        api.state().items.push(item(7, 2_000, 1));
        let (manager, surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.set_quantity(ProductId::new(7), 5).await;

        assert_eq!(outcome, MutationOutcome::Reapplied { available: 3 });
        assert_eq!(api.quantity_of(7), Some(3));
        assert_eq!(
            api.state().updates,
            vec![(ProductId::new(7), 5), (ProductId::new(7), 3)]
        );

        let notifications = surface.notifications();
        assert_eq!(notifications[0].text, "Solo quedan 3 unidades");
        assert_eq!(notifications[0].level, Level::Warning);
        assert_eq!(
            notifications[1].text,
            "Cantidad ajustada al stock disponible: 3"
        );
        assert_eq!(
            manager.rows().displayed_quantity(ProductId::new(7)),
            Quantity::new(3).ok()
        );
    }

    #[tokio::test]
    async fn test_stock_limit_of_zero_is_not_resubmitted() {
        let api = Arc::new(FakeApi::with_stock(&[(7, 0)]));
        api.state().items.push(item(7, 2_000, 1));
        let (manager, _surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.set_quantity(ProductId::new(7), 2).await;

        assert_eq!(outcome, MutationOutcome::Reverted);
        assert_eq!(api.state().updates.len(), 1);
        assert_eq!(api.quantity_of(7), Some(1));
    }

    #[tokio::test]
    async fn test_transport_failure_refreshes_from_server() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(2, 1_000, 2));
        api.state().fail_updates = true;
        let (manager, surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.set_quantity(ProductId::new(2), 4).await;

        assert_eq!(outcome, MutationOutcome::Reverted);
        assert!(surface.notified(MSG_UPDATE_FAILED));
        assert!(!surface.notified("Bad Gateway"));
        assert_eq!(
            manager.rows().displayed_quantity(ProductId::new(2)),
            Quantity::new(2).ok()
        );
    }

    #[tokio::test]
    async fn test_anonymous_remote_add_requires_login() {
        let api = Arc::new(FakeApi::default());
        let (manager, surface) = remote(&api, CartSession::anonymous());

        let outcome = manager.add(ProductId::new(1)).await;

        assert_eq!(outcome, MutationOutcome::LoginRequired);
        assert!(api.state().items.is_empty());
        assert!(surface.notified(MSG_LOGIN_TO_ADD));
    }

    #[tokio::test]
    async fn test_remote_add_shows_server_message() {
        let api = Arc::new(FakeApi::default());
        let (manager, surface) = remote(&api, CartSession::authenticated());

        manager.add(ProductId::new(1)).await;

        assert!(surface.notified("Producto agregado"));
        assert_eq!(surface.badge(), Some(1));
    }

    #[tokio::test]
    async fn test_clear_continues_past_failed_removal() {
        let api = Arc::new(FakeApi::default());
        {
            let mut state = api.state();
            state.items = vec![item(1, 1_000, 1), item(2, 1_000, 1), item(3, 1_000, 1)];
            state.failing_removals.insert(ProductId::new(2));
        }
        let (manager, surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.clear().await;

        assert_eq!(outcome, MutationOutcome::Partial { failed: 1 });
        assert_eq!(api.state().removals.len(), 3);
        assert_eq!(api.quantity_of(2), Some(1));
        assert_eq!(api.state().items.len(), 1);

        let markup = surface.cart_markup().unwrap();
        assert!(markup.contains("cart-row-2"));
        assert!(!markup.contains("cart-row-1"));
    }

    #[tokio::test]
    async fn test_declined_remove_changes_nothing() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(1, 1_000, 1));
        let (manager, surface) = remote(&api, CartSession::authenticated());
        surface.set_confirm_answer(false);

        let outcome = manager.remove(ProductId::new(1)).await;

        assert_eq!(outcome, MutationOutcome::Cancelled);
        assert!(api.state().removals.is_empty());
        assert_eq!(surface.recorded().prompts, vec![CONFIRM_REMOVE.to_string()]);
    }

    #[tokio::test]
    async fn test_remove_rerenders_and_notifies() {
        let api = Arc::new(FakeApi::default());
        api.state().items = vec![item(1, 1_000, 1), item(2, 1_000, 2)];
        let (manager, surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.remove(ProductId::new(1)).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(surface.badge(), Some(2));
        assert!(surface.notified(MSG_REMOVED));
        assert!(manager.rows().get(ProductId::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_increments_compose() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(4, 1_000, 1));
        let (manager, _surface) = remote(&api, CartSession::authenticated());
        manager.refresh().await.unwrap();

        let id = ProductId::new(4);
        tokio::join!(
            manager.change_quantity_by(id, 1),
            manager.change_quantity_by(id, 1),
            manager.change_quantity_by(id, 1),
        );

        assert_eq!(api.quantity_of(4), Some(4));
    }

    #[tokio::test]
    async fn test_decrement_never_goes_below_one() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(4, 1_000, 1));
        let (manager, _surface) = remote(&api, CartSession::authenticated());
        manager.refresh().await.unwrap();

        manager.change_quantity_by(ProductId::new(4), -1).await;
        assert_eq!(api.quantity_of(4), Some(1));
    }

    #[tokio::test]
    async fn test_change_quantity_of_missing_product() {
        let api = Arc::new(FakeApi::default());
        let (manager, surface) = remote(&api, CartSession::authenticated());

        let outcome = manager.change_quantity_by(ProductId::new(9), 1).await;

        assert_eq!(outcome, MutationOutcome::Reverted);
        assert!(api.state().updates.is_empty());
        assert!(surface.notified("no está en el carrito"));
    }

    #[tokio::test]
    async fn test_checkout_decisions() {
        let api = Arc::new(FakeApi::default());

        let (anonymous, _) = remote(&api, CartSession::anonymous());
        assert_eq!(anonymous.checkout().await.unwrap(), CheckoutDecision::Login);

        let (manager, surface) = remote(&api, CartSession::authenticated());
        assert_eq!(
            manager.checkout().await.unwrap(),
            CheckoutDecision::EmptyCart
        );
        assert!(surface.notified(MSG_EMPTY_CART));

        api.state().items.push(item(1, 1_000, 1));
        let decision = manager.checkout().await.unwrap();
        assert_eq!(decision, CheckoutDecision::Proceed);
        assert_eq!(decision.redirect(), Some(CHECKOUT_PATH));
    }

    #[tokio::test]
    async fn test_load_cart_page_anonymous_shows_login_placeholder() {
        let api = Arc::new(FakeApi::default());
        let (manager, surface) = remote(&api, CartSession::anonymous());

        manager.load(CART_PAGE_PATH).await;

        assert!(surface.cart_markup().unwrap().contains("/login"));
        assert_eq!(surface.badge(), Some(0));
    }

    #[tokio::test]
    async fn test_load_other_page_only_updates_badge() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(1, 1_000, 3));
        let (manager, surface) = remote(&api, CartSession::authenticated());

        manager.load("/productos").await;

        assert_eq!(surface.badge(), Some(3));
        assert!(surface.cart_markup().is_none());
    }

    #[tokio::test]
    async fn test_rejected_session_shows_login_placeholder() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(1, 1_000, 2));
        api.state().session_expired = true;
        let (manager, surface) = remote(&api, CartSession::authenticated());

        manager.load(CART_PAGE_PATH).await;

        assert!(surface.cart_markup().unwrap().contains("/registro"));
        assert_eq!(surface.badge(), Some(0));
        assert!(!surface.notified(MSG_LOAD_FAILED));
        assert!(manager.rows().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_session_prompts_for_the_attempted_action() {
        let api = Arc::new(FakeApi::default());
        api.state().items.push(item(1, 1_000, 2));
        api.state().session_expired = true;
        let (manager, surface) = remote(&api, CartSession::authenticated());

        assert_eq!(
            manager.add(ProductId::new(1)).await,
            MutationOutcome::LoginRequired
        );
        assert!(surface.notified(MSG_LOGIN_TO_ADD));
        assert!(!surface.notified(MSG_LOGIN_TO_EDIT));

        assert_eq!(
            manager.set_quantity(ProductId::new(1), 3).await,
            MutationOutcome::LoginRequired
        );
        assert!(surface.notified(MSG_LOGIN_TO_EDIT));

        assert_eq!(manager.checkout().await.unwrap(), CheckoutDecision::Login);
        assert!(surface.notified(MSG_LOGIN_TO_CHECKOUT));
    }

    #[tokio::test]
    async fn test_out_of_range_prices_are_reported_not_rendered() {
        let api = Arc::new(FakeApi::default());
        let mut huge = item(1, 0, 2);
        huge.unit_price = Price::new(rust_decimal::Decimal::MAX);
        api.state().items.push(huge);
        let (manager, surface) = remote(&api, CartSession::authenticated());

        manager.load(CART_PAGE_PATH).await;

        assert!(surface.cart_markup().is_none());
        assert!(surface.notified(MSG_LOAD_FAILED));
        assert!(matches!(
            manager.totals().await,
            Err(CartError::InvalidAmount(_))
        ));
        assert!(matches!(
            manager.refresh().await,
            Err(CartError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_local_add_with_out_of_range_price_is_reverted() {
        let mut huge = item(1, 0, 1);
        huge.unit_price = Price::new(rust_decimal::Decimal::MAX);
        let store = Arc::new(MemoryStore::with_items(vec![huge]));
        let (manager, surface) = local(store.clone());

        let outcome = manager.add(ProductId::new(1)).await;

        assert_eq!(outcome, MutationOutcome::Reverted);
        assert_eq!(store.saved()[0].quantity.get(), 1);
        assert!(surface.notified(MSG_ADD_FAILED));
    }
}
