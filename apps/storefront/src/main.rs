//! # PeelO Storefront
//!
//! Command-line shell over the storefront stores.
//!
//! ## Usage
//! ```text
//! storefront [CONFIG_PATH]
//!
//! PEELO_EMAIL / PEELO_PASSWORD   log in before rendering the profile card
//! PEELO_BRANCH                   select a branch by id
//! RUST_LOG                       log filter (default: info,peelo=debug)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use peelo_client::{ClientConfig, Storefront};
use peelo_core::EntityId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load_or_default(config_path);
    info!(api = %config.api.base_url, "Starting PeelO storefront");

    let app = Storefront::open(config).context("opening storefront")?;
    let restored = app.start().await;
    if let Some(user) = &restored.user {
        println!("Welcome back, {}", user.display_name());
    }

    if let Ok(id) = std::env::var("PEELO_BRANCH") {
        let id: EntityId = id.parse().context("PEELO_BRANCH must be a branch id")?;
        select_branch(&app, id).await?;
    }

    if let (Ok(email), Ok(password)) = (std::env::var("PEELO_EMAIL"), std::env::var("PEELO_PASSWORD")) {
        let result = app.session().login(&email, &password).await;
        app.toasts().report(&result, "Logged in successfully");
    }

    render_home(&app).await;
    render_profile(&app).await;

    for toast in app.toasts().active() {
        println!("[{:?}] {}", toast.kind, toast.message);
    }

    app.shutdown();
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=peelo_client=trace` - Trace the client crate only
/// - Default: INFO, DEBUG for peelo crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,peelo=debug,peelo_client=debug,peelo_core=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn select_branch(app: &Storefront, id: EntityId) -> anyhow::Result<()> {
    let branches = app.branches().list().await?;
    match branches.into_iter().find(|b| b.id == id && b.is_active) {
        Some(branch) => {
            println!("Branch: {}", branch.name);
            app.branches().select(branch);
        }
        None => warn!(branch_id = id, "Branch not found or inactive"),
    }
    Ok(())
}

async fn render_home(app: &Storefront) {
    if let Err(e) = app.catalog().refresh().await {
        app.toasts().error(e.user_message());
        return;
    }

    let currency = &app.config().currency;
    println!("Featured juices");
    for product in app.catalog().home_products() {
        println!(
            "  {:<32} {:>10}  {}",
            product.name,
            currency.format(product.price),
            app.catalog().image_url(&product)
        );
    }

    let totals = app.cart().totals();
    println!(
        "Cart: {} item(s), {}",
        totals.item_count,
        currency.format(totals.total)
    );
}

async fn render_profile(app: &Storefront) {
    let Some(user) = app.session().current_user() else {
        return;
    };

    match app.profile().fetch_stats().await {
        Ok(stats) => {
            let currency = &app.config().currency;
            println!("{} ({})", user.display_name(), user.email);
            println!("  Orders:    {}", stats.total_orders);
            println!("  Spent:     {}", currency.format_with(stats.total_spent, 0));
            println!("  Addresses: {}", stats.saved_addresses);
        }
        Err(e) => {
            app.toasts().error(e.user_message());
        }
    }
}
