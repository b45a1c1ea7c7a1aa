//! Product listing with filters.
//!
//! # Usage
//!
//! ```bash
//! tienda products --category Periféricos --price 50-100 --search teclado
//! ```

use tienda_cart::CartError;
use tienda_cart::api::HttpCartClient;
use tienda_cart::filter::{PriceBucket, ProductFilter};

/// Print products matching `filter`.
#[allow(clippy::print_stdout)]
pub async fn list(client: &HttpCartClient, filter: &ProductFilter) -> Result<(), CartError> {
    let products = client.list_products().await?;
    let result = filter.apply(&products);

    if result.no_results {
        println!("No se encontraron productos");
        return Ok(());
    }

    for product in result.visible {
        println!(
            "{:>5}  {:<32} {:<16} {}",
            product.id,
            product.nombre,
            product.categoria.as_deref().unwrap_or("-"),
            product.precio
        );
    }
    Ok(())
}

/// Build a filter from command-line criteria. Empty strings are unset.
pub fn filter_from_args(
    category: Option<String>,
    price: Option<PriceBucket>,
    search: Option<String>,
) -> ProductFilter {
    ProductFilter {
        category: category.filter(|c| !c.trim().is_empty()),
        price,
        search: search.filter(|s| !s.trim().is_empty()),
    }
}
