//! Tienda CLI - Drive the shopping cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! tienda show
//!
//! # Add, adjust and remove
//! tienda add 12
//! tienda set 12 5
//! tienda inc 12
//! tienda remove 12
//!
//! # Filter the catalog
//! tienda products --price 100-
//! ```
//!
//! # Environment Variables
//!
//! - `TIENDA_BASE_URL` - Storefront origin (required)
//! - `TIENDA_SESSION_COOKIE` - Session cookie; its presence logs the shopper in
//! - `TIENDA_CART_BACKEND` - `remote` (default), `auto` or `local`
//! - `TIENDA_CART_PATH` - Local cart file (default `carrito.json`)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tienda_cart::api::HttpCartClient;
use tienda_cart::filter::PriceBucket;
use tienda_cart::{CartConfig, CartStateManager};
use tienda_core::ProductId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod terminal;

use terminal::TerminalSurface;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda shopping cart")]
struct Cli {
    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Print the rendered cart markup after each change
    #[arg(long, global = true)]
    html: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cart contents and totals
    Show,
    /// Print the number of items in the cart
    Count,
    /// Print subtotal, shipping and total
    Totals,
    /// Add one unit of a product
    Add { product_id: ProductId },
    /// Set the quantity of a product (values below 1 become 1)
    Set {
        product_id: ProductId,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Increase a product's quantity
    Inc {
        product_id: ProductId,
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
    /// Decrease a product's quantity
    Dec {
        product_id: ProductId,
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
    /// Remove a product from the cart
    Remove { product_id: ProductId },
    /// Remove every product from the cart
    Clear,
    /// Check whether checkout may proceed
    Checkout,
    /// Run the page-load hook for a storefront path
    Load {
        #[arg(default_value = "/")]
        path: String,
    },
    /// List products, optionally filtered
    Products {
        #[arg(long)]
        category: Option<String>,
        /// Price range: `min-max`, `min-` or `min`
        #[arg(long)]
        price: Option<PriceBucket>,
        #[arg(long)]
        search: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tienda_cart=info,tienda=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    use commands::{cart, products};

    if let Commands::Products {
        category,
        price,
        search,
    } = cli.command
    {
        let client = HttpCartClient::new(config);
        let filter = products::filter_from_args(category, price, search);
        products::list(&client, &filter).await?;
        return Ok(());
    }

    let surface = Arc::new(TerminalSurface::new(cli.yes, cli.html));
    let manager = CartStateManager::from_config(config, surface)?;

    match cli.command {
        Commands::Show => cart::show(&manager).await?,
        Commands::Count => cart::count(&manager).await?,
        Commands::Totals => cart::totals(&manager).await?,
        Commands::Add { product_id } => cart::add(&manager, product_id).await?,
        Commands::Set {
            product_id,
            quantity,
        } => cart::set(&manager, product_id, quantity).await?,
        Commands::Inc { product_id, by } => cart::step(&manager, product_id, by).await?,
        Commands::Dec { product_id, by } => cart::step(&manager, product_id, -by).await?,
        Commands::Remove { product_id } => cart::remove(&manager, product_id).await?,
        Commands::Clear => cart::clear(&manager).await?,
        Commands::Checkout => cart::checkout(&manager).await?,
        Commands::Load { path } => cart::load(&manager, &path).await?,
        Commands::Products { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_set_accepts_negative_quantity() {
        let cli = Cli::try_parse_from(["tienda", "set", "4", "-2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Set { quantity: -2, .. }
        ));
    }

    #[test]
    fn test_price_bucket_argument() {
        let cli = Cli::try_parse_from(["tienda", "products", "--price", "100-"]).unwrap();
        let Commands::Products { price, .. } = cli.command else {
            panic!("expected products command");
        };
        assert_eq!(price.unwrap().max, None);
    }
}
