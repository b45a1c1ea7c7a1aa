//! Stock-limit extraction from prose error messages.
//!
//! The storefront reports a stock shortfall as a human-readable sentence such
//! as "Stock insuficiente. Solo quedan 3 unidades disponibles". This parser is
//! a compatibility shim for that format and is fragile by nature: any change
//! to the server wording silently turns a stock limit into a plain rejection.
//! Servers should send `{"kind": "stock_limit", "available": N}` instead,
//! which [`super::wire::MutationResponse`] prefers when present.

use std::sync::LazyLock;

use regex::Regex;

static STOCK_LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Solo quedan (\d+) unidades").expect("Invalid regex"));

/// Remaining units mentioned in a stock-limit message, if any.
#[must_use]
pub fn parse_stock_limit(message: &str) -> Option<u32> {
    STOCK_LIMIT_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}
