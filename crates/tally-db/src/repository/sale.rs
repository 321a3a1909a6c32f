//! # Sale Repository
//!
//! Append-only storage for completed sales.
//!
//! ## Atomic Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_sale(&sale)                                                       │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT INTO sales       (id, receipt, cashier, totals, ...)         │
//! │    INSERT INTO sale_lines  (line 0)                                    │
//! │    INSERT INTO sale_lines  (line 1)                                    │
//! │    ...                                                                  │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure before COMMIT drops the transaction: SQLite rolls back    │
//! │  and neither the sale nor any of its lines exist.                      │
//! │                                                                         │
//! │  Rows are never updated or deleted afterwards (triggers enforce it).  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use tally_core::{
    CashierId, Currency, Money, ProductId, Sale, SaleId, SaleLine, SaleParts, TaxRate, Totals,
    ValidationError,
};

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: SaleId,
    receipt_number: String,
    cashier_id: CashierId,
    currency_code: String,
    currency_exponent: i64,
    subtotal: i64,
    discount_total: i64,
    tax_total: i64,
    grand_total: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleLineRow {
    product_id: ProductId,
    name: String,
    unit_price: i64,
    quantity: i64,
    line_total: i64,
    discount: i64,
    tax_rate_bps: i64,
    tax: i64,
}

impl TryFrom<SaleLineRow> for SaleLine {
    type Error = DbError;

    fn try_from(row: SaleLineRow) -> DbResult<Self> {
        let bps = u32::try_from(row.tax_rate_bps).map_err(|_| ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        })?;

        Ok(SaleLine {
            product_id: row.product_id,
            name: row.name,
            unit_price: Money::from_minor(row.unit_price),
            quantity: row.quantity,
            line_total: Money::from_minor(row.line_total),
            discount: Money::from_minor(row.discount),
            tax_rate: TaxRate::from_bps(bps),
            tax: Money::from_minor(row.tax),
        })
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Writes a sale and all of its lines in one transaction.
    ///
    /// Resubmitting a sale that is already stored (same id, receipt number
    /// and total) succeeds without writing anything: a checkout retried after
    /// a lost acknowledgement must not record the sale twice.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the id or receipt number belongs to
    ///   a different sale
    /// * `Err(DbError::ForeignKeyViolation)` - unknown cashier
    /// * `Err(DbError::TransactionFailed)` - commit failed
    ///
    /// In every error case nothing was written.
    pub async fn save_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id(), receipt_number = %sale.receipt_number(), "Saving sale");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let totals = sale.totals();

        let existing: Option<(String, i64)> =
            sqlx::query_as("SELECT receipt_number, grand_total FROM sales WHERE id = ?1")
                .bind(sale.id())
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((receipt_number, grand_total)) = existing {
            if receipt_number == sale.receipt_number() && grand_total == totals.grand_total.minor() {
                info!(id = %sale.id(), receipt_number = %receipt_number, "Sale already stored");
                return Ok(());
            }
            return Err(DbError::duplicate("sales.id", sale.id().as_str()));
        }

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, cashier_id, currency_code, currency_exponent,
                subtotal, discount_total, tax_total, grand_total, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(sale.id())
        .bind(sale.receipt_number())
        .bind(sale.cashier_id())
        .bind(sale.currency().code())
        .bind(i64::from(sale.currency().exponent()))
        .bind(totals.subtotal.minor())
        .bind(totals.discount_total.minor())
        .bind(totals.tax_total.minor())
        .bind(totals.grand_total.minor())
        .bind(sale.created_at())
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in sale.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    sale_id, line_no, product_id, name, unit_price, quantity,
                    line_total, discount, tax_rate_bps, tax
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(sale.id())
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(line.name.as_str())
            .bind(line.unit_price.minor())
            .bind(line.quantity)
            .bind(line.line_total.minor())
            .bind(line.discount.minor())
            .bind(i64::from(line.tax_rate.bps()))
            .bind(line.tax.minor())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            id = %sale.id(),
            receipt_number = %sale.receipt_number(),
            lines = sale.lines().len(),
            grand_total = totals.grand_total.minor(),
            "Sale saved"
        );
        Ok(())
    }

    /// Loads a sale with its lines in their original order.
    pub async fn get_by_id(&self, id: &SaleId) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(
            r#"
            SELECT id, receipt_number, cashier_id, currency_code, currency_exponent,
                   subtotal, discount_total, tax_total, grand_total, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines: Vec<SaleLineRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, unit_price, quantity, line_total,
                   discount, tax_rate_bps, tax
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let lines = lines
            .into_iter()
            .map(SaleLine::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        let exponent = u8::try_from(row.currency_exponent).map_err(|_| ValidationError::OutOfRange {
            field: "currency_exponent".to_string(),
            min: 0,
            max: i64::from(Currency::MAX_EXPONENT),
        })?;

        let sale = Sale::from_parts(SaleParts {
            id: row.id,
            receipt_number: row.receipt_number,
            cashier_id: row.cashier_id,
            currency: Currency::new(&row.currency_code, exponent)?,
            lines,
            totals: Totals {
                subtotal: Money::from_minor(row.subtotal),
                discount_total: Money::from_minor(row.discount_total),
                tax_total: Money::from_minor(row.tax_total),
                grand_total: Money::from_minor(row.grand_total),
            },
            created_at: row.created_at,
        })?;

        Ok(Some(sale))
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let ids: Vec<SaleId> =
            sqlx::query_scalar("SELECT id FROM sales ORDER BY created_at DESC, rowid DESC LIMIT ?1")
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;

        let mut sales = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(sale) = self.get_by_id(&id).await? {
                sales.push(sale);
            }
        }
        Ok(sales)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
