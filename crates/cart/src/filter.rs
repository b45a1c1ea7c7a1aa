//! Attribute filtering over a product listing.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::Product;

/// Price range in whole currency units, inclusive on both ends.
///
/// Parsed from `"min-max"`, `"min-"` or `"min"`; a missing or zero maximum
/// leaves the range open above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBucket {
    pub min: Decimal,
    pub max: Option<Decimal>,
}

impl PriceBucket {
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && self.max.is_none_or(|max| price <= max)
    }
}

/// Malformed price bucket.
#[derive(Debug, Error)]
#[error("invalid price range '{0}'")]
pub struct InvalidBucket(String);

impl FromStr for PriceBucket {
    type Err = InvalidBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBucket(s.to_string());
        let (min, max) = s.split_once('-').unwrap_or((s, ""));

        let min = min.trim().parse::<Decimal>().map_err(|_| invalid())?;
        let max = match max.trim() {
            "" => None,
            raw => Some(raw.parse::<Decimal>().map_err(|_| invalid())?),
        }
        .filter(|max| !max.is_zero());

        Ok(Self { min, max })
    }
}

/// Filter criteria. An unset criterion matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub price: Option<PriceBucket>,
    pub search: Option<String>,
}

/// Products left visible by a filter.
#[derive(Debug, Clone)]
pub struct FilterResult<'a> {
    pub visible: Vec<&'a Product>,
    pub no_results: bool,
}

impl ProductFilter {
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|c| product.categoria.as_deref() == Some(c));

        let price_ok = self
            .price
            .is_none_or(|bucket| bucket.contains(product.precio.amount()));

        let search_ok = self.search.as_deref().is_none_or(|term| {
            product
                .nombre
                .to_lowercase()
                .contains(&term.trim().to_lowercase())
        });

        category_ok && price_ok && search_ok
    }

    #[must_use]
    pub fn apply<'a>(&self, products: &'a [Product]) -> FilterResult<'a> {
        let visible: Vec<&Product> = products.iter().filter(|p| self.matches(p)).collect();
        FilterResult {
            no_results: visible.is_empty(),
            visible,
        }
    }

    /// Reset every criterion.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
