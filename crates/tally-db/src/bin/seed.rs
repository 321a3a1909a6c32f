//! # Seed Data Generator
//!
//! Populates a database with categories, a cashier and products for
//! development.
//!
//! ## Usage
//! ```bash
//! # 500 products into ./tally_dev.db (defaults)
//! cargo run -p tally-db --bin seed
//!
//! cargo run -p tally-db --bin seed -- --count 2000 --db ./data/tally.db
//! ```
//!
//! SKUs look like `{CATEGORY}-{NAME}-{INDEX}`, e.g. `BEV-COC-004`. Prices run
//! from 1.99 to 9.99 plus a size addon; tax rates cycle through 0%, 5%,
//! 8.25% and 10%.

use chrono::Utc;
use clap::Parser;

use tally_core::{Cashier, CashierId, Category, CategoryId, Money, Product, ProductId, TaxRate};
use tally_db::{Database, DbConfig};

/// Product categories: SKU prefix, category name, base product names.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Dr Pepper",
            "Red Bull",
            "Gatorade",
            "Spring Water",
            "Orange Juice",
            "Lemonade",
            "Iced Tea",
        ],
    ),
    (
        "SNK",
        "Snacks",
        &[
            "Potato Chips",
            "Tortilla Chips",
            "Cheese Puffs",
            "Pretzels",
            "Chocolate Bar",
            "Gummy Bears",
            "Sandwich Cookies",
            "Trail Mix",
        ],
    ),
    (
        "DRY",
        "Dairy",
        &[
            "Whole Milk",
            "Oat Milk",
            "Cheddar Cheese",
            "Butter",
            "Greek Yogurt",
            "Cream Cheese",
            "Eggs Dozen",
        ],
    ),
    (
        "GRO",
        "Grocery",
        &[
            "White Bread",
            "Pasta Penne",
            "Brown Rice",
            "Canned Beans",
            "Oatmeal",
            "Peanut Butter",
            "Honey",
            "Flour",
        ],
    ),
];

/// Size variants with their price addon in minor units.
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("12oz", 0),
    ("20oz", 100),
    ("6-Pack", 300),
];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Tally POS seed data generator")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./tally_dev.db")]
    db: String,

    /// Number of products to generate
    #[arg(short, long, default_value_t = 500)]
    count: usize,

    /// Id of the cashier to create
    #[arg(long, default_value = "default")]
    cashier_id: String,

    /// Currency code stamped on every product
    #[arg(long, default_value = "USD")]
    currency: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", args.db);
    println!("Products: {}", args.count);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;
    println!("✓ Connected to database, migrations applied");

    let cashier_id = CashierId::from(args.cashier_id.as_str());
    if db.cashiers().get_by_id(&cashier_id).await?.is_none() {
        db.cashiers()
            .insert(&Cashier {
                id: cashier_id.clone(),
                display_name: "Default Cashier".to_string(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await?;
        println!("✓ Created cashier '{}'", cashier_id);
    }

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        db.close().await;
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_idx, (code, category_name, names)) in CATEGORIES.iter().enumerate() {
        let category = Category {
            id: CategoryId::generate(),
            name: category_name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        db.categories().insert(&category).await?;

        for (product_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if generated >= args.count {
                    break 'outer;
                }

                let product = generate_product(
                    code,
                    &category.id,
                    name,
                    size,
                    *addon,
                    &args.currency,
                    category_idx * 1000 + product_idx * 20 + size_idx,
                );

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
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

    let hits = db.products().search("cola", 10).await?;
    println!("  Search 'cola': {} results", hits.len());

    db.close().await;
    println!("✓ Seed complete!");
    Ok(())
}

/// Builds one product with deterministic price and tax from `seed`.
fn generate_product(
    category: &str,
    category_id: &CategoryId,
    name: &str,
    size: &str,
    price_addon: i64,
    currency: &str,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", category, short, seed);

    let base_price = 199 + ((seed * 17) % 800) as i64;

    Product {
        id: ProductId::generate(),
        sku,
        name: format!("{} {}", name, size),
        category_id: Some(category_id.clone()),
        unit_price: Money::from_minor(base_price + price_addon),
        tax_rate: TaxRate::from_bps(TAX_RATES[seed % TAX_RATES.len()]),
        currency_code: currency.to_uppercase(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
