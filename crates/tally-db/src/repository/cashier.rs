//! # Cashier Repository

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use tally_core::validation::validate_name;
use tally_core::{Cashier, CashierId};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct CashierRow {
    id: CashierId,
    display_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CashierRow> for Cashier {
    fn from(row: CashierRow) -> Self {
        Cashier {
            id: row.id,
            display_name: row.display_name,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Cashiers referenced by completed sales.
#[derive(Debug, Clone)]
pub struct CashierRepository {
    pool: SqlitePool,
}

impl CashierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashierRepository { pool }
    }

    pub async fn insert(&self, cashier: &Cashier) -> DbResult<()> {
        validate_name("display_name", &cashier.display_name)?;
        debug!(id = %cashier.id, "Inserting cashier");

        sqlx::query(
            "INSERT INTO cashiers (id, display_name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&cashier.id)
        .bind(cashier.display_name.trim())
        .bind(cashier.is_active)
        .bind(cashier.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &CashierId) -> DbResult<Option<Cashier>> {
        let row: Option<CashierRow> = sqlx::query_as(
            "SELECT id, display_name, is_active, created_at FROM cashiers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cashier::from))
    }
}
