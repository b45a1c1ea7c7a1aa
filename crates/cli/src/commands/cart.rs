//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with totals
//! tienda show
//!
//! # Add one unit of product 12, then set it to 3
//! tienda add 12
//! tienda set 12 3
//!
//! # Step a quantity relative to what the cart shows
//! tienda inc 12
//! tienda dec 12 --by 2
//!
//! # Empty the cart without a prompt
//! tienda --yes clear
//! ```

use thiserror::Error;
use tienda_cart::{CartError, CartSnapshot, CartStateManager, CheckoutDecision, MutationOutcome};
use tienda_core::ProductId;

/// Errors from cart commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The cart could not be read.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The mutation ended without being applied.
    #[error("Cart left unchanged ({0:?})")]
    NotApplied(MutationOutcome),

    /// Checkout cannot proceed.
    #[error("Checkout blocked ({0:?})")]
    CheckoutBlocked(CheckoutDecision),
}

fn settled(outcome: MutationOutcome) -> Result<(), CommandError> {
    match outcome {
        MutationOutcome::Applied
        | MutationOutcome::Reapplied { .. }
        | MutationOutcome::Cancelled => Ok(()),
        other => Err(CommandError::NotApplied(other)),
    }
}

/// Print the cart contents and summary.
pub async fn show(manager: &CartStateManager) -> Result<(), CommandError> {
    let snapshot = manager.refresh().await?;
    print_snapshot(&snapshot);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_snapshot(snapshot: &CartSnapshot) {
    if snapshot.items.is_empty() {
        println!("Tu carrito está vacío");
        return;
    }

    for item in &snapshot.items {
        let line_total = item
            .line_total()
            .map_or_else(|_| "-".to_string(), |total| total.display());
        println!(
            "{:>5}  {:<32} {:>10} x{:<3} {:>10}",
            item.product_id, item.name, item.unit_price, item.quantity, line_total
        );
    }
    println!();
    println!("Subtotal: {}", snapshot.totals.subtotal);
    println!("Envío:    {}", snapshot.totals.shipping);
    println!("Total:    {}", snapshot.totals.total);
    println!("Artículos: {}", snapshot.item_count);
}

#[allow(clippy::print_stdout)]
pub async fn count(manager: &CartStateManager) -> Result<(), CommandError> {
    println!("{}", manager.item_count().await?);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn totals(manager: &CartStateManager) -> Result<(), CommandError> {
    let totals = manager.totals().await?;
    println!("Subtotal: {}", totals.subtotal);
    println!("Envío:    {}", totals.shipping);
    println!("Total:    {}", totals.total);
    Ok(())
}

pub async fn add(manager: &CartStateManager, product_id: ProductId) -> Result<(), CommandError> {
    settled(manager.add(product_id).await)
}

pub async fn set(
    manager: &CartStateManager,
    product_id: ProductId,
    quantity: i64,
) -> Result<(), CommandError> {
    settled(manager.set_quantity(product_id, quantity).await)
}

pub async fn step(
    manager: &CartStateManager,
    product_id: ProductId,
    delta: i64,
) -> Result<(), CommandError> {
    settled(manager.change_quantity_by(product_id, delta).await)
}

pub async fn remove(manager: &CartStateManager, product_id: ProductId) -> Result<(), CommandError> {
    settled(manager.remove(product_id).await)
}

pub async fn clear(manager: &CartStateManager) -> Result<(), CommandError> {
    settled(manager.clear().await)
}

#[allow(clippy::print_stdout)]
pub async fn checkout(manager: &CartStateManager) -> Result<(), CommandError> {
    let decision = manager.checkout().await?;
    match decision {
        CheckoutDecision::Proceed => {
            if let Some(path) = decision.redirect() {
                println!("{path}");
            }
            Ok(())
        }
        blocked => Err(CommandError::CheckoutBlocked(blocked)),
    }
}

pub async fn load(manager: &CartStateManager, path: &str) -> Result<(), CommandError> {
    manager.load(path).await;
    Ok(())
}
