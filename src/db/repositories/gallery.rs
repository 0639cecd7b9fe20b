//! Gallery repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{GalleryItem, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn create(&self, item: &GalleryItem) -> Result<GalleryItem>;

    async fn get_by_id(&self, id: i64) -> Result<Option<GalleryItem>>;

    /// One page of items, optionally within a category, plus the total
    async fn list(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<GalleryItem>, i64)>;

    /// Distinct non-empty categories, alphabetical
    async fn categories(&self) -> Result<Vec<String>>;

    async fn update(&self, item: &GalleryItem) -> Result<GalleryItem>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxGalleryRepository {
    pool: DynDatabasePool,
}

impl SqlxGalleryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GalleryRepository> {
        Arc::new(Self::new(pool))
    }
}

const GALLERY_COLUMNS: &str =
    "id, title, description, image_url, category, sort_order, created_at, updated_at";

#[async_trait]
impl GalleryRepository for SqlxGalleryRepository {
    async fn create(&self, item: &GalleryItem) -> Result<GalleryItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_item_sqlite(self.pool.sqlite()?, item).await,
            DatabaseDriver::Mysql => create_item_mysql(self.pool.mysql()?, item).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<GalleryItem>> {
        let sql = format!("SELECT {} FROM gallery_items WHERE id = ?", GALLERY_COLUMNS);
        let item = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get gallery item")?
                .as_ref()
                .map(row_to_item_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get gallery item")?
                .as_ref()
                .map(row_to_item_mysql),
        };
        Ok(item)
    }

    async fn list(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<GalleryItem>, i64)> {
        let where_clause = if category.is_some() { "WHERE category = ?" } else { "" };
        let count_sql = format!("SELECT COUNT(*) AS count FROM gallery_items {}", where_clause);
        let list_sql = format!(
            "SELECT {} FROM gallery_items {} ORDER BY sort_order ASC, created_at DESC, id DESC \
             LIMIT ? OFFSET ?",
            GALLERY_COLUMNS, where_clause
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let mut count_query = sqlx::query(&count_sql);
                let mut list_query = sqlx::query(&list_sql);
                if let Some(category) = category {
                    count_query = count_query.bind(category);
                    list_query = list_query.bind(category);
                }
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count gallery items")?
                    .get("count");
                let items = list_query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list gallery items")?
                    .iter()
                    .map(row_to_item_sqlite)
                    .collect();
                Ok((items, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let mut count_query = sqlx::query(&count_sql);
                let mut list_query = sqlx::query(&list_sql);
                if let Some(category) = category {
                    count_query = count_query.bind(category);
                    list_query = list_query.bind(category);
                }
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count gallery items")?
                    .get("count");
                let items = list_query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list gallery items")?
                    .iter()
                    .map(row_to_item_mysql)
                    .collect();
                Ok((items, total))
            }
        }
    }

    async fn categories(&self) -> Result<Vec<String>> {
        const SQL: &str = "SELECT DISTINCT category FROM gallery_items \
                           WHERE category IS NOT NULL AND category != '' ORDER BY category";
        let categories = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list gallery categories")?
                .iter()
                .map(|row| row.get("category"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list gallery categories")?
                .iter()
                .map(|row| row.get("category"))
                .collect(),
        };
        Ok(categories)
    }

    async fn update(&self, item: &GalleryItem) -> Result<GalleryItem> {
        const SQL: &str = r#"
            UPDATE gallery_items
            SET title = ?, description = ?, image_url = ?, category = ?, sort_order = ?,
                updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&item.title)
                    .bind(&item.description)
                    .bind(&item.image_url)
                    .bind(&item.category)
                    .bind(item.sort_order)
                    .bind(now)
                    .bind(item.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update gallery item")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&item.title)
                    .bind(&item.description)
                    .bind(&item.image_url)
                    .bind(&item.category)
                    .bind(item.sort_order)
                    .bind(now)
                    .bind(item.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update gallery item")?;
            }
        }
        Ok(GalleryItem {
            updated_at: now,
            ..item.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM gallery_items WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete gallery item")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete gallery item")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_item_sqlite(pool: &SqlitePool, item: &GalleryItem) -> Result<GalleryItem> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO gallery_items (title, description, image_url, category, sort_order,
                                   created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image_url)
    .bind(&item.category)
    .bind(item.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create gallery item")?;

    Ok(GalleryItem {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..item.clone()
    })
}

fn row_to_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> GalleryItem {
    GalleryItem {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        category: row.get("category"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_item_mysql(pool: &MySqlPool, item: &GalleryItem) -> Result<GalleryItem> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO gallery_items (title, description, image_url, category, sort_order,
                                   created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image_url)
    .bind(&item.category)
    .bind(item.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create gallery item")?;

    Ok(GalleryItem {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..item.clone()
    })
}

fn row_to_item_mysql(row: &sqlx::mysql::MySqlRow) -> GalleryItem {
    GalleryItem {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        category: row.get("category"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
