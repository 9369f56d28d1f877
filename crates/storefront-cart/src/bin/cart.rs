//! # Cart CLI
//!
//! Drives the cart store against the configured storage, for development.
//!
//! ## Usage
//! ```bash
//! # Show the persisted cart
//! cargo run -p storefront-cart --bin cart -- show
//!
//! # Add sample lines (run twice to watch quantities merge)
//! cargo run -p storefront-cart --bin cart -- --db ./cart_dev.db demo
//!
//! # Empty the cart
//! cargo run -p storefront-cart --bin cart -- clear
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use storefront_cart::{CartChange, CartConfig, CartStore, StorageBackend};
use storefront_core::{Money, Prices, Product, Variant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    Demo,
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut command = Command::Show;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "show" => command = Command::Show,
            "demo" => command = Command::Demo,
            "clear" => command = Command::Clear,
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    let mut config = CartConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = Some(path);
    }

    println!("Storefront Cart");
    println!("===============");
    match config.storage.backend {
        StorageBackend::Sqlite => println!("Storage: {}", config.database_path().display()),
        StorageBackend::Memory => println!("Storage: memory"),
    }

    let storage = config.open_storage().await?;
    let store = CartStore::open(storage, config.store_settings()).await;

    store.subscribe(|change: &CartChange| {
        println!(
            "  {:?}: {} items, {}",
            change.kind, change.totals.item_count, change.totals.subtotal
        );
    });

    match command {
        Command::Show => {}
        Command::Demo => run_demo(&store),
        Command::Clear => {
            store.clear_cart();
        }
    }

    store.flush().await;
    print_cart(&store);

    let status = store.persistence_status();
    if let Some(error) = status.last_error {
        eprintln!(
            "⚠ {} of {} writes failed, last error: {}",
            status.writes_failed,
            status.writes_ok + status.writes_failed,
            error
        );
    }

    Ok(())
}

/// Installs the tracing subscriber (`RUST_LOG` overrides the default filter).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_help() {
    println!("Storefront Cart");
    println!();
    println!("Usage: cart [OPTIONS] [show|demo|clear]");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>        SQLite file (overrides config)");
    println!("  -c, --config <PATH>    cart.toml path");
    println!("  -h, --help             Show this help message");
}

fn run_demo(store: &CartStore) {
    let (apples, shirt) = sample_catalog();
    let xl = shirt.variants.first();

    println!();
    println!("Adding sample lines...");
    store.add_line(&apples, None);
    store.add_line(&apples, None);
    store.add_line(&shirt, xl);
    store.add_line(&shirt, None);
    store.remove_line(&shirt.id, None);
}

fn print_cart(store: &CartStore) {
    let totals = store.totals();

    println!();
    if totals.line_count == 0 {
        println!("Cart is empty");
        return;
    }

    for line in store.lines() {
        let variant = line
            .variant_selector()
            .map(|v| format!(" [{}]", v))
            .unwrap_or_default();
        println!(
            "  {:>3} × {}{} @ {} = {}",
            line.quantity(),
            line.title(),
            variant,
            line.unit_price(),
            line.line_total()
        );
    }
    println!();
    println!("Lines:    {}", totals.line_count);
    println!("Items:    {}", totals.item_count);
    println!("Subtotal: {}", totals.subtotal);
    if !totals.savings.is_zero() {
        println!("Savings:  {}", totals.savings);
    }
}

fn sample_catalog() -> (Product, Product) {
    let apples = Product {
        id: "p-apple".into(),
        slug: "organic-apples".into(),
        title: "Organic Apples".into(),
        image: vec!["https://cdn.example/apple.jpg".into()],
        stock: Some(40),
        prices: Prices {
            price: Some(Money::from_cents(250)),
            original_price: Some(Money::from_cents(300)),
            discount: Some(Money::from_cents(50)),
        },
        ..Default::default()
    };

    let mut attributes = BTreeMap::new();
    attributes.insert("size".to_string(), "xl".to_string());
    let shirt = Product {
        id: "p-shirt".into(),
        slug: "basic-tee".into(),
        title: "Basic Tee".into(),
        prices: Prices {
            price: Some(Money::from_cents(1200)),
            ..Default::default()
        },
        variants: vec![Variant {
            sku: Some("TEE-XL".into()),
            attributes,
            price: Some(Money::from_cents(1500)),
            stock: Some(8),
            ..Default::default()
        }],
        ..Default::default()
    };

    (apples, shirt)
}
