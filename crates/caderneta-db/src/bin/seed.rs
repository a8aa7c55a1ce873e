//! # Seed Data Generator
//!
//! Populates the database with test products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p caderneta-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p caderneta-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p caderneta-db --bin seed -- --db ./data/caderneta.db
//! ```
//!
//! ## Generated Products
//! Creates grocery staples across categories (mercearia, bebidas,
//! limpeza, padaria, hortifruti), each with a deterministic price and
//! stock level derived from its index.

use chrono::Utc;
use std::env;
use uuid::Uuid;

use caderneta_core::Product;
use caderneta_db::{Database, DbConfig};

/// Product names per category for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "mercearia",
        &[
            "Arroz 5kg",
            "Feijão Carioca 1kg",
            "Açúcar Cristal 1kg",
            "Café Torrado 500g",
            "Óleo de Soja 900ml",
            "Macarrão Espaguete 500g",
            "Farinha de Trigo 1kg",
            "Sal Refinado 1kg",
            "Molho de Tomate 340g",
            "Sardinha em Lata 125g",
        ],
    ),
    (
        "bebidas",
        &[
            "Refrigerante Cola 2L",
            "Guaraná 2L",
            "Suco de Laranja 1L",
            "Água Mineral 500ml",
            "Água com Gás 500ml",
            "Cerveja Pilsen 350ml",
            "Leite Integral 1L",
            "Achocolatado 1L",
        ],
    ),
    (
        "limpeza",
        &[
            "Sabão em Pó 1kg",
            "Detergente 500ml",
            "Água Sanitária 1L",
            "Amaciante 2L",
            "Esponja de Aço",
            "Desinfetante 500ml",
        ],
    ),
    (
        "padaria",
        &[
            "Pão Francês",
            "Pão de Forma",
            "Bolo de Fubá",
            "Biscoito Recheado",
            "Torrada Integral",
        ],
    ),
    (
        "hortifruti",
        &[
            "Banana Prata kg",
            "Tomate kg",
            "Cebola kg",
            "Batata kg",
            "Alface Crespa",
            "Laranja Pera kg",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./caderneta_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caderneta POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./caderneta_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Caderneta POS Seed Data Generator");
    println!("====================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate products
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: loop {
        for (category, names) in CATEGORIES {
            for (idx, name) in names.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(category, name, generated * 31 + idx);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;

                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let low_stock = db.products().list_low_stock().await?;
    println!("  Low stock products: {}", low_stock.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(category: &str, name: &str, seed: usize) -> Product {
    let now = Utc::now();

    // Price between R$0.99 and R$30.99, stock between 0 and 79
    let price_cents = 99 + ((seed * 613) % 3000) as i64;
    let stock_quantity = ((seed * 97) % 80) as i64;

    let unit = if name.ends_with("kg") { "kg" } else { "unidade" };

    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: None,
        price_cents,
        cost_price_cents: Some(price_cents * 7 / 10),
        stock_quantity,
        min_stock: 5,
        unit: unit.to_string(),
        category: Some(category.to_string()),
        supplier_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
