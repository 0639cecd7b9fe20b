//! Short link repository
//!
//! Click counts only move through [`ShortUrlRepository::increment_clicks`],
//! a single `clicks = clicks + 1` statement, so concurrent redirects never
//! lose or reverse an increment.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, OgMetadata, ShortUrl};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    async fn create(&self, short_url: &ShortUrl) -> Result<ShortUrl>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ShortUrl>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ShortUrl>>;

    /// Newest first, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<ShortUrl>, i64)>;

    /// Persist destination, title, active flag and expiry
    async fn update(&self, short_url: &ShortUrl) -> Result<ShortUrl>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Add one click; false when no link has this id
    async fn increment_clicks(&self, id: i64) -> Result<bool>;

    async fn set_og(&self, id: i64, og: &OgMetadata) -> Result<()>;
}

pub struct SqlxShortUrlRepository {
    pool: DynDatabasePool,
}

impl SqlxShortUrlRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ShortUrlRepository> {
        Arc::new(Self::new(pool))
    }
}

const SHORT_URL_COLUMNS: &str = "id, slug, destination, title, clicks, is_active, expires_at, \
                                 og_title, og_description, og_image, created_by, created_at, updated_at";

#[async_trait]
impl ShortUrlRepository for SqlxShortUrlRepository {
    async fn create(&self, short_url: &ShortUrl) -> Result<ShortUrl> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_short_url_sqlite(self.pool.sqlite()?, short_url).await,
            DatabaseDriver::Mysql => create_short_url_mysql(self.pool.mysql()?, short_url).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ShortUrl>> {
        let sql = format!("SELECT {} FROM short_urls WHERE id = ?", SHORT_URL_COLUMNS);
        let short_url = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get short URL by ID")?
                .as_ref()
                .map(row_to_short_url_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get short URL by ID")?
                .as_ref()
                .map(row_to_short_url_mysql),
        };
        Ok(short_url)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ShortUrl>> {
        let sql = format!("SELECT {} FROM short_urls WHERE slug = ?", SHORT_URL_COLUMNS);
        let short_url = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get short URL by slug")?
                .as_ref()
                .map(row_to_short_url_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get short URL by slug")?
                .as_ref()
                .map(row_to_short_url_mysql),
        };
        Ok(short_url)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<ShortUrl>, i64)> {
        const COUNT_SQL: &str = "SELECT COUNT(*) AS count FROM short_urls";
        let list_sql = format!(
            "SELECT {} FROM short_urls ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            SHORT_URL_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let total: i64 = sqlx::query(COUNT_SQL)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count short URLs")?
                    .get("count");
                let items = sqlx::query(&list_sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list short URLs")?
                    .iter()
                    .map(row_to_short_url_sqlite)
                    .collect();
                Ok((items, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let total: i64 = sqlx::query(COUNT_SQL)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count short URLs")?
                    .get("count");
                let items = sqlx::query(&list_sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list short URLs")?
                    .iter()
                    .map(row_to_short_url_mysql)
                    .collect();
                Ok((items, total))
            }
        }
    }

    async fn update(&self, short_url: &ShortUrl) -> Result<ShortUrl> {
        const SQL: &str = r#"
            UPDATE short_urls
            SET destination = ?, title = ?, is_active = ?, expires_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&short_url.destination)
                    .bind(&short_url.title)
                    .bind(short_url.is_active)
                    .bind(short_url.expires_at)
                    .bind(now)
                    .bind(short_url.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update short URL")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&short_url.destination)
                    .bind(&short_url.title)
                    .bind(short_url.is_active)
                    .bind(short_url.expires_at)
                    .bind(now)
                    .bind(short_url.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update short URL")?;
            }
        }
        Ok(ShortUrl {
            updated_at: now,
            ..short_url.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM short_urls WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete short URL")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete short URL")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) AS count FROM short_urls WHERE slug = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(slug)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check short URL slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(slug)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check short URL slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn increment_clicks(&self, id: i64) -> Result<bool> {
        const SQL: &str = "UPDATE short_urls SET clicks = clicks + 1 WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to increment clicks")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to increment clicks")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn set_og(&self, id: i64, og: &OgMetadata) -> Result<()> {
        const SQL: &str = r#"
            UPDATE short_urls
            SET og_title = ?, og_description = ?, og_image = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&og.title)
                    .bind(&og.description)
                    .bind(&og.image)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to store Open Graph data")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&og.title)
                    .bind(&og.description)
                    .bind(&og.image)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to store Open Graph data")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_short_url_sqlite(pool: &SqlitePool, short_url: &ShortUrl) -> Result<ShortUrl> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO short_urls (slug, destination, title, clicks, is_active, expires_at,
                                og_title, og_description, og_image, created_by,
                                created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&short_url.slug)
    .bind(&short_url.destination)
    .bind(&short_url.title)
    .bind(short_url.is_active)
    .bind(short_url.expires_at)
    .bind(&short_url.og_title)
    .bind(&short_url.og_description)
    .bind(&short_url.og_image)
    .bind(short_url.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create short URL")?;

    Ok(ShortUrl {
        id: result.last_insert_rowid(),
        clicks: 0,
        created_at: now,
        updated_at: now,
        ..short_url.clone()
    })
}

fn row_to_short_url_sqlite(row: &sqlx::sqlite::SqliteRow) -> ShortUrl {
    ShortUrl {
        id: row.get("id"),
        slug: row.get("slug"),
        destination: row.get("destination"),
        title: row.get("title"),
        clicks: row.get("clicks"),
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        og_title: row.get("og_title"),
        og_description: row.get("og_description"),
        og_image: row.get("og_image"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_short_url_mysql(pool: &MySqlPool, short_url: &ShortUrl) -> Result<ShortUrl> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO short_urls (slug, destination, title, clicks, is_active, expires_at,
                                og_title, og_description, og_image, created_by,
                                created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&short_url.slug)
    .bind(&short_url.destination)
    .bind(&short_url.title)
    .bind(short_url.is_active)
    .bind(short_url.expires_at)
    .bind(&short_url.og_title)
    .bind(&short_url.og_description)
    .bind(&short_url.og_image)
    .bind(short_url.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create short URL")?;

    Ok(ShortUrl {
        id: result.last_insert_id() as i64,
        clicks: 0,
        created_at: now,
        updated_at: now,
        ..short_url.clone()
    })
}

fn row_to_short_url_mysql(row: &sqlx::mysql::MySqlRow) -> ShortUrl {
    ShortUrl {
        id: row.get("id"),
        slug: row.get("slug"),
        destination: row.get("destination"),
        title: row.get("title"),
        clicks: row.get("clicks"),
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        og_title: row.get("og_title"),
        og_description: row.get("og_description"),
        og_image: row.get("og_image"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
