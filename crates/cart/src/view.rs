//! Cart rendering.
//!
//! Rendering is a pure function of the item list and totals. Alongside the
//! markup it produces a [`RowMap`], the renderer's record of which rows are on
//! screen and what quantity each one displays.

use std::collections::BTreeMap;

use askama::Template;
use tienda_core::{AmountOverflow, LineItem, ProductId, Quantity, Totals};

use crate::error::Result;

/// Directory the storefront serves product images from.
const IMAGE_DIR: &str = "/static/images/productos";

/// Display-ready cart row.
#[derive(Debug, Clone)]
pub struct CartRowView {
    pub row_id: String,
    pub product_id: i32,
    pub name: String,
    pub category: String,
    pub image_url: String,
    pub price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl TryFrom<&LineItem> for CartRowView {
    type Error = AmountOverflow;

    fn try_from(item: &LineItem) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            row_id: row_id(item.product_id),
            product_id: item.product_id.as_i32(),
            name: item.name.clone(),
            category: item.category.clone(),
            image_url: format!("{IMAGE_DIR}/{}", item.image_ref),
            price: item.unit_price.display(),
            quantity: item.quantity.get(),
            line_total: item.line_total()?.display(),
        })
    }
}

/// Display-ready order summary. The discount is not shown.
#[derive(Debug, Clone)]
pub struct SummaryView {
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
}

impl From<&Totals> for SummaryView {
    fn from(totals: &Totals) -> Self {
        Self {
            subtotal: totals.subtotal.display(),
            shipping: totals.shipping.display(),
            total: totals.total.display(),
        }
    }
}

/// Cart rows and summary.
#[derive(Template)]
#[template(path = "cart/items.html")]
pub struct CartItemsTemplate {
    pub rows: Vec<CartRowView>,
    pub summary: SummaryView,
}

/// Placeholder for an empty cart.
#[derive(Template)]
#[template(path = "cart/empty.html")]
pub struct CartEmptyTemplate;

/// Placeholder for a server cart with no logged-in shopper.
#[derive(Template)]
#[template(path = "cart/login_required.html")]
pub struct LoginRequiredTemplate;

/// Navigation badge fragment.
#[derive(Template)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Stable row id for a product.
#[must_use]
pub fn row_id(product_id: ProductId) -> String {
    format!("cart-row-{product_id}")
}

/// A row currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEntry {
    pub row_id: String,
    pub quantity: Quantity,
}

/// Rows on screen, keyed by product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMap {
    rows: BTreeMap<ProductId, RowEntry>,
}

impl RowMap {
    #[must_use]
    pub fn from_items(items: &[LineItem]) -> Self {
        let rows = items
            .iter()
            .map(|item| {
                (
                    item.product_id,
                    RowEntry {
                        row_id: row_id(item.product_id),
                        quantity: item.quantity,
                    },
                )
            })
            .collect();
        Self { rows }
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&RowEntry> {
        self.rows.get(&product_id)
    }

    /// Quantity the row for `product_id` displays.
    #[must_use]
    pub fn displayed_quantity(&self, product_id: ProductId) -> Option<Quantity> {
        self.rows.get(&product_id).map(|row| row.quantity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Output of [`render_cart`].
#[derive(Debug, Clone)]
pub struct RenderedCart {
    pub markup: String,
    pub rows: RowMap,
}

/// Render the cart region.
///
/// # Errors
///
/// Returns an error if a line total is out of range or a template fails to
/// render.
pub fn render_cart(items: &[LineItem], totals: &Totals) -> Result<RenderedCart> {
    let markup = if items.is_empty() {
        CartEmptyTemplate.render()?
    } else {
        CartItemsTemplate {
            rows: items
                .iter()
                .map(CartRowView::try_from)
                .collect::<std::result::Result<_, _>>()?,
            summary: SummaryView::from(totals),
        }
        .render()?
    };

    Ok(RenderedCart {
        markup,
        rows: RowMap::from_items(items),
    })
}

/// Render the login placeholder shown instead of a server cart.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_login_required() -> std::result::Result<String, askama::Error> {
    LoginRequiredTemplate.render()
}

/// Render the navigation badge.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_badge(count: u32) -> std::result::Result<String, askama::Error> {
    CartCountTemplate { count }.render()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::Price;

    use super::*;
    use crate::error::CartError;

    fn item(id: i32, cents: i64, qty: i64) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: format!("Teclado <{id}>"),
            unit_price: Price::from_cents(cents),
            quantity: Quantity::new(qty).unwrap(),
            image_ref: format!("teclado{id}.jpg"),
            category: "Periféricos".to_string(),
        }
    }

    #[test]
    fn test_rows_keyed_by_product() {
        let items = vec![item(3, 4_500, 2), item(8, 1_000, 1)];
        let rendered = render_cart(&items, &Totals::from_items(&items).unwrap()).unwrap();

        assert_eq!(rendered.rows.len(), 2);
        assert!(rendered.markup.contains(r#"id="cart-row-3""#));
        assert!(rendered.markup.contains(r#"id="cart-row-8""#));
        assert!(rendered.markup.contains("$90.00"));
        assert!(rendered.markup.contains("/static/images/productos/teclado3.jpg"));
        assert_eq!(
            rendered.rows.displayed_quantity(ProductId::new(3)),
            Some(Quantity::new(2).unwrap())
        );
    }

    #[test]
    fn test_summary_without_discount_line() {
        let items = vec![item(1, 25_000, 1)];
        let rendered = render_cart(&items, &Totals::from_items(&items).unwrap()).unwrap();

        assert!(rendered.markup.contains("$250.00"));
        assert!(rendered.markup.contains("$0.00"));
        assert!(!rendered.markup.contains("Descuento"));
    }

    #[test]
    fn test_names_are_escaped() {
        let items = vec![item(1, 100, 1)];
        let rendered = render_cart(&items, &Totals::from_items(&items).unwrap()).unwrap();
        assert!(!rendered.markup.contains("<1>"));
    }

    #[test]
    fn test_empty_cart_has_placeholder_and_no_summary() {
        let rendered = render_cart(&[], &Totals::EMPTY).unwrap();
        assert!(rendered.rows.is_empty());
        assert!(rendered.markup.contains("Tu carrito está vacío"));
        assert!(!rendered.markup.contains("Subtotal"));
    }

    #[test]
    fn test_out_of_range_line_is_an_error() {
        let mut huge = item(1, 0, 2);
        huge.unit_price = Price::new(rust_decimal::Decimal::MAX);
        let result = render_cart(&[huge], &Totals::EMPTY);
        assert!(matches!(result, Err(CartError::InvalidAmount(_))));
    }

    #[test]
    fn test_login_placeholder_links() {
        let markup = render_login_required().unwrap();
        assert!(markup.contains("/login"));
        assert!(markup.contains("/registro"));
    }

    #[test]
    fn test_badge() {
        assert!(render_badge(7).unwrap().contains('7'));
    }
}
