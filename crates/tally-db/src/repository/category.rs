//! # Category Repository
//!
//! Product groupings. Categories are referenced by products and never hard
//! deleted while a product points at them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use tally_core::validation::validate_name;
use tally_core::{Category, CategoryId};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a category. Names are unique.
    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        validate_name("name", &category.name)?;
        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&category.id)
            .bind(category.name.trim())
            .bind(category.is_active)
            .bind(category.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &CategoryId) -> DbResult<Option<Category>> {
        let row: Option<CategoryRow> =
            sqlx::query_as("SELECT id, name, is_active, created_at FROM categories WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Category::from))
    }

    /// Active categories sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM categories WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }
}
