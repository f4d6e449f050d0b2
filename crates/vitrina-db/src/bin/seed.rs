//! # Seed Data Generator
//!
//! Prepares a development database: built-in roles, a main store, an
//! administrator and a catalogue of demo garments with stock.
//!
//! ## Usage
//! ```bash
//! cargo run -p vitrina-db --bin seed
//! cargo run -p vitrina-db --bin seed -- --db ./data/vitrina.db --store "Centro"
//! ```
//!
//! Each demo product gets a code `{GARMENT}-{COLOR}-{SIZE}`, a price
//! between 89.00 and 349.00 and a cost of roughly 55% of the price.

use std::env;

use vitrina_db::{bootstrap, AdminSeed, Database, DbConfig, NewProduct};

/// Garment families: code, description, base price in cents.
const GARMENTS: &[(&str, &str, i64)] = &[
    ("CAM", "Camiseta básica", 8_900),
    ("POL", "Polo piqué", 14_900),
    ("BLU", "Blusa de lino", 19_900),
    ("JEA", "Jeans corte recto", 29_900),
    ("SUD", "Sudadera con capucha", 34_900),
    ("SHO", "Short de mezclilla", 15_900),
];

const COLORS: &[(&str, &str)] = &[("NEG", "negro"), ("BLA", "blanco"), ("AZU", "azul")];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitrina_db=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./vitrina_dev.db");
    let mut store_name = String::from("Tienda Principal");
    let mut admin_password = String::from("admin123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" if i + 1 < args.len() => {
                db_path = args[i + 1].clone();
                i += 1;
            }
            "--store" | "-s" if i + 1 < args.len() => {
                store_name = args[i + 1].clone();
                i += 1;
            }
            "--admin-password" if i + 1 < args.len() => {
                admin_password = args[i + 1].clone();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Vitrina POS seed");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>            Database file (default: ./vitrina_dev.db)");
                println!("  -s, --store <NAME>         Main store name (default: Tienda Principal)");
                println!("      --admin-password <PW>  Password of the 'admin' user (default: admin123)");
                println!("  -h, --help                 Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    println!("Vitrina POS seed");
    println!("================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Migrations applied");

    let admin = AdminSeed {
        username: "admin".to_string(),
        password: admin_password,
        display_name: "Administrador".to_string(),
    };
    let setup = bootstrap(&db, Some(&admin)).await?;
    println!("✓ {} built-in roles", setup.roles.len());
    match &setup.admin_created {
        Some(user) => println!("✓ Administrator '{}' created", user.username),
        None => println!("  Users already exist, administrator not created"),
    }

    let stores = db.stores().list(false).await?;
    let store = match stores.into_iter().next() {
        Some(store) => {
            println!("  Using existing store '{}'", store.name);
            store
        }
        None => {
            let store = db.stores().create(&store_name, None).await?;
            println!("✓ Store '{}' created", store.name);
            store
        }
    };

    if db.products().count().await? > 0 {
        println!();
        println!("⚠ Products already exist, skipping the demo catalogue.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for (g, (garment, description, base_price)) in GARMENTS.iter().enumerate() {
        for (c, (color_code, color)) in COLORS.iter().enumerate() {
            for (s, size) in SIZES.iter().enumerate() {
                let seed = g * 100 + c * 10 + s;
                let price_cents = base_price + (s as i64) * 1_000;
                let product = NewProduct {
                    code: format!("{}-{}-{}", garment, color_code, size),
                    description: description.to_string(),
                    size: Some(size.to_string()),
                    color: Some(color.to_string()),
                    price_cents,
                    cost_cents: Some(price_cents * 55 / 100),
                };
                let stock = vec![(store.id.clone(), ((seed * 7) % 25) as i64)];

                if let Err(e) = db.products().create(product, &stock, None).await {
                    eprintln!("Failed to create {}-{}-{}: {}", garment, color_code, size, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    println!("✓ Generated {} products in {:?}", generated, start.elapsed());

    let found = db.products().search("camiseta", 5).await?;
    println!("  Search 'camiseta': {} results", found.len());

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
