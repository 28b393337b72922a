//! Spaza CLI - Command-line storefront.
//!
//! # Usage
//!
//! ```bash
//! # Create an account, then sign in
//! spaza signup --first-name Thandi --last-name Nkosi -e thandi@example.co.za -p secret1
//! spaza signin -e thandi@example.co.za -p secret1
//!
//! # Browse and fill the cart
//! spaza products
//! spaza add 65a1f0c2e4b0
//! spaza update <LINE_ID> 3
//! spaza cart
//!
//! # Place the order and write the invoice
//! spaza checkout --payment cash --country "South Africa" --province Gauteng \
//!     --suburb Braamfontein --city Johannesburg --street "Jorissen Street" \
//!     --area-code 2001 --invoice
//! ```
//!
//! # Commands
//!
//! - `signup` / `signin` / `signout` - Account and session
//! - `products` / `product` - Catalog
//! - `cart` / `add` / `remove` / `update` - Cart
//! - `checkout` - Submit the order, optionally writing the invoice
//!
//! The session token is kept in `SPAZA_SESSION_FILE` between invocations and
//! validated against the server before every command.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spaza_core::{CartLineId, ProductId};
use spaza_storefront::AppState;
use spaza_storefront::config::StorefrontConfig;
use spaza_storefront::services::notices;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "spaza")]
#[command(author, version, about = "Spaza command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    Signup {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Sign in and remember the session
    Signin {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored session
    Signout,
    /// List the catalog
    Products,
    /// Show one product
    Product {
        /// Product ID
        id: ProductId,
    },
    /// Show the cart
    Cart,
    /// Add one unit of a product to the cart
    Add {
        /// Product ID
        product_id: ProductId,
    },
    /// Remove a cart line
    Remove {
        /// Cart line ID (see `spaza cart`)
        line_id: CartLineId,
    },
    /// Set the quantity of a cart line; zero or less removes it
    Update {
        /// Cart line ID (see `spaza cart`)
        line_id: CartLineId,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Submit the cart as an order
    Checkout(commands::checkout::CheckoutArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Invalid configuration: {e}");
            }
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so stdout stays the command's output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "spaza_storefront=warn,spaza_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let (notifier, mut notices) = notices::channel();
    let result = match AppState::from_config(config, notifier) {
        Ok(state) => run(cli, &state).await,
        Err(e) => Err(e.into()),
    };

    output::notices(&notices.drain());

    if let Err(e) = result {
        tracing::debug!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    // A rejected token has already been reported; carry on as a guest.
    if let Err(e) = state.restore_session().await {
        tracing::debug!("Continuing without a session: {e}");
    }

    match cli.command {
        Commands::Signup {
            first_name,
            last_name,
            email,
            password,
        } => commands::account::sign_up(state, first_name, last_name, email, password).await?,
        Commands::Signin { email, password } => {
            commands::account::sign_in(state, email, password).await?;
        }
        Commands::Signout => commands::account::sign_out(state).await?,
        Commands::Products => commands::shop::products(state).await?,
        Commands::Product { id } => commands::shop::product(state, &id).await?,
        Commands::Cart => commands::shop::cart(state).await,
        Commands::Add { product_id } => commands::shop::add(state, &product_id).await?,
        Commands::Remove { line_id } => commands::shop::remove(state, &line_id).await?,
        Commands::Update { line_id, quantity } => {
            commands::shop::update(state, &line_id, quantity).await?;
        }
        Commands::Checkout(args) => commands::checkout::run(state, args).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use spaza_core::PaymentMethod;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_accepts_negative_quantity() {
        let cli = Cli::try_parse_from(["spaza", "update", "l1", "-1"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Update { quantity: -1, .. })
        ));
    }

    #[test]
    fn test_checkout_payment_method() {
        let cli = Cli::try_parse_from([
            "spaza",
            "checkout",
            "--payment",
            "online",
            "--country",
            "South Africa",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Checkout(args)) if args.payment == PaymentMethod::Online
        ));
    }
}
