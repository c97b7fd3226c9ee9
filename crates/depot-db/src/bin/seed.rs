//! # Seed Data Generator
//!
//! Populates a Depot database with locations, products and opening stock
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by depot.toml (or the default data dir)
//! cargo run -p depot-db --bin seed
//!
//! # Explicit database file
//! cargo run -p depot-db --bin seed -- --db ./depot_dev.db
//!
//! # Explicit config file
//! cargo run -p depot-db --bin seed -- --config ./depot.toml
//! ```
//!
//! ## Generated Data
//! - 3 locations: `WH-MAIN`, `WH-EAST`, `SHOP-01`
//! - `--products` products (default 50) across a few categories
//! - One applied receipt per location carrying opening stock, so every
//!   quantity has a matching RECEIPT move in the history

use std::env;
use std::path::PathBuf;

use depot_core::document::{DocumentBody, LineItem, NewDocument};
use depot_core::{NewLocation, NewProduct, Product, MAX_DOCUMENT_ITEMS};
use depot_db::{Database, DepotConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SEED_USER: &str = "seed";

const LOCATIONS: &[(&str, &str)] = &[
    ("WH-MAIN", "Main Warehouse"),
    ("WH-EAST", "East Warehouse"),
    ("SHOP-01", "Downtown Shop"),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("HW", &["Hex Bolt M8", "Wood Screw 40mm", "Wall Anchor", "Hinge 75mm", "Cable Tie"]),
    ("EL", &["LED Bulb E27", "Extension Cord 5m", "Wall Socket", "Fuse 16A", "Switch"]),
    ("PT", &["Wall Paint 5L", "Primer 1L", "Roller 25cm", "Brush Set", "Masking Tape"]),
    ("GD", &["Garden Hose 20m", "Pruning Shears", "Seed Mix", "Planter Pot", "Gloves"]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,depot=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut product_count: usize = 50;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    product_count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
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
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>   Number of products to generate (default: 50)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file (default: ./depot.toml)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = DepotConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Depot Seed Data Generator");
    println!("=========================");
    println!("Database: {}", config.database.path.display());
    println!("Products: {}", product_count);
    println!();

    let db = Database::open(&config).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut locations = Vec::with_capacity(LOCATIONS.len());
    for (code, name) in LOCATIONS {
        let location = db
            .locations()
            .create(&NewLocation {
                code: code.to_string(),
                name: name.to_string(),
                address: None,
            })
            .await?;
        locations.push(location);
    }
    println!("✓ Created {} locations", locations.len());

    let products = generate_products(&db, product_count).await?;
    println!("✓ Created {} products", products.len());

    for (loc_idx, location) in locations.iter().enumerate() {
        let items: Vec<LineItem> = products
            .iter()
            .enumerate()
            .map(|(idx, p)| LineItem::new(&p.id, opening_quantity(idx, loc_idx)))
            .filter(|item| item.quantity > 0)
            .collect();

        for chunk in items.chunks(MAX_DOCUMENT_ITEMS) {
            let receipt = NewDocument::new(DocumentBody::Receipt {
                location_id: location.id.clone(),
                supplier: "Opening Balance".to_string(),
                items: chunk.to_vec(),
            })
            .with_notes("Opening stock");

            let doc = db.documents().create(&receipt, SEED_USER).await?;
            db.documents().apply(&doc.id, SEED_USER).await?;
            info!(location = %location.code, number = %doc.number, "Opening stock received");
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Opening stock applied in {:?}", elapsed);
    println!("  Move history entries: {}", db.moves().count().await?);
    println!(
        "  Products at or below reorder level: {}",
        db.stock().below_reorder_level().await?.len()
    );

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

async fn generate_products(
    db: &Database,
    count: usize,
) -> Result<Vec<Product>, Box<dyn std::error::Error>> {
    let mut products = Vec::with_capacity(count);

    let names = CATEGORIES
        .iter()
        .flat_map(|(category, names)| names.iter().map(move |name| (*category, *name)));

    for (seed, (category, name)) in names.cycle().take(count).enumerate() {
        let unit_price_cents = 199 + ((seed * 37) % 4_800) as i64;
        let input = NewProduct {
            sku: format!("{}-{:04}", category, seed + 1),
            name: if seed < CATEGORIES.len() * 5 {
                name.to_string()
            } else {
                format!("{} #{}", name, seed + 1)
            },
            description: None,
            unit_price_cents,
            cost_cents: Some(unit_price_cents * (55 + (seed % 25) as i64) / 100),
            reorder_level: (seed % 4) as i64 * 5,
        };

        match db.products().create(&input).await {
            Ok(product) => products.push(product),
            Err(e) => eprintln!("Failed to insert {}: {}", input.sku, e),
        }
    }

    Ok(products)
}

/// Deterministic opening quantity; some pairs stay empty.
fn opening_quantity(product_idx: usize, location_idx: usize) -> i64 {
    ((product_idx * 7 + location_idx * 13) % 60) as i64
}
