//! # Product Repository
//!
//! Catalog storage. The register reads through [`ProductRepository::get_by_id`]
//! (via `CatalogLookup`) at add time and again at checkout; back-office
//! tools write through [`ProductRepository::save_product`].
//!
//! ## Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operator types: "cola"                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  name LIKE '%cola%' OR sku LIKE 'cola%'   (active products only)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEV-COC-000  Coca-Cola 12oz      ← match on name                      │
//! │  BEV-COC-001  Coca-Cola 16oz      ← match on name                      │
//! │  ordered by name, capped at `limit`                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use tally_core::validation::{validate_product, validate_search_query};
use tally_core::{CategoryId, Money, Product, ProductId, TaxRate, ValidationError};

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, sku, name, category_id, unit_price, tax_rate_bps, \
                               currency_code, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    sku: String,
    name: String,
    category_id: Option<CategoryId>,
    unit_price: i64,
    tax_rate_bps: i64,
    currency_code: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let bps = u32::try_from(row.tax_rate_bps).map_err(|_| ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        })?;

        Ok(Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category_id: row.category_id,
            unit_price: Money::from_minor(row.unit_price),
            tax_rate: TaxRate::from_bps(bps),
            currency_code: row.currency_code,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let results = repo.search("coke", 20).await?;
/// let product = repo.get_by_id(&ProductId::from("...")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &ProductId) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::try_from).transpose()
    }

    /// Catalog-management name for [`get_by_id`](Self::get_by_id).
    pub async fn load_product(&self, id: &ProductId) -> DbResult<Option<Product>> {
        self.get_by_id(id).await
    }

    /// Gets a product by its SKU (e.g. "COKE-330").
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS))
                .bind(sku.trim())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::try_from).transpose()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - id or SKU already exists
    /// * `Err(DbError::InvalidData)` - product fails validation
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id, unit_price, tax_rate_bps,
                currency_code, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(&product.category_id)
        .bind(product.unit_price.minor())
        .bind(i64::from(product.tax_rate.bps()))
        .bind(product.currency_code.to_ascii_uppercase())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts the product, or replaces every mutable field if the id exists.
    ///
    /// `created_at` of an existing row is kept; `updated_at` is set to now.
    pub async fn save_product(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        debug!(id = %product.id, sku = %product.sku, "Saving product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id, unit_price, tax_rate_bps,
                currency_code, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                sku = excluded.sku,
                name = excluded.name,
                category_id = excluded.category_id,
                unit_price = excluded.unit_price,
                tax_rate_bps = excluded.tax_rate_bps,
                currency_code = excluded.currency_code,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(&product.category_id)
        .bind(product.unit_price.minor())
        .bind(i64::from(product.tax_rate.bps()))
        .bind(product.currency_code.to_ascii_uppercase())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2,
                name = ?3,
                category_id = ?4,
                unit_price = ?5,
                tax_rate_bps = ?6,
                currency_code = ?7,
                is_active = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(&product.category_id)
        .bind(product.unit_price.minor())
        .bind(i64::from(product.tax_rate.bps()))
        .bind(product.currency_code.to_ascii_uppercase())
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id.as_str()));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales keep their own copy of the product, and a cart that
    /// still holds it fails checkout with `ProductUnavailable`.
    pub async fn soft_delete(&self, id: &ProductId) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.as_str()));
        }

        Ok(())
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    /// Searches active products by name substring or SKU prefix.
    ///
    /// An empty query lists active products.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let escaped = escape_like(&query);
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM products
            WHERE is_active = 1
              AND (name LIKE ?1 ESCAPE '\' OR sku LIKE ?2 ESCAPE '\')
            ORDER BY name
            LIMIT ?3
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(format!("%{}%", escaped))
        .bind(format!("{}%", escaped))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Search returned products");
        into_products(rows)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
