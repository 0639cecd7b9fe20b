//! View counter repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ContentMeta;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ContentMetaRepository: Send + Sync {
    /// Add one view, creating the counter on first use; returns the new total
    async fn increment_views(&self, slug: &str) -> Result<i64>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentMeta>>;

    /// Most viewed first
    async fn list_top(&self, limit: i64) -> Result<Vec<ContentMeta>>;
}

pub struct SqlxContentMetaRepository {
    pool: DynDatabasePool,
}

impl SqlxContentMetaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentMetaRepository> {
        Arc::new(Self::new(pool))
    }
}

const META_COLUMNS: &str = "id, slug, views, created_at, updated_at";

const VIEWS_SQL: &str = "SELECT views FROM content_meta WHERE slug = ?";

#[async_trait]
impl ContentMetaRepository for SqlxContentMetaRepository {
    async fn increment_views(&self, slug: &str) -> Result<i64> {
        let now = Utc::now();
        let views = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                sqlx::query(
                    r#"
                    INSERT INTO content_meta (slug, views, created_at, updated_at)
                    VALUES (?, 1, ?, ?)
                    ON CONFLICT(slug) DO UPDATE SET views = views + 1, updated_at = excluded.updated_at
                    "#,
                )
                .bind(slug)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to increment views")?;
                sqlx::query(VIEWS_SQL)
                    .bind(slug)
                    .fetch_one(pool)
                    .await
                    .context("Failed to read views")?
                    .get("views")
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                sqlx::query(
                    r#"
                    INSERT INTO content_meta (slug, views, created_at, updated_at)
                    VALUES (?, 1, ?, ?)
                    ON DUPLICATE KEY UPDATE views = views + 1, updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(slug)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to increment views")?;
                sqlx::query(VIEWS_SQL)
                    .bind(slug)
                    .fetch_one(pool)
                    .await
                    .context("Failed to read views")?
                    .get("views")
            }
        };
        Ok(views)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentMeta>> {
        let sql = format!("SELECT {} FROM content_meta WHERE slug = ?", META_COLUMNS);
        let meta = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get view counter")?
                .map(|row| ContentMeta {
                    id: row.get("id"),
                    slug: row.get("slug"),
                    views: row.get("views"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get view counter")?
                .map(|row| ContentMeta {
                    id: row.get("id"),
                    slug: row.get("slug"),
                    views: row.get("views"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                }),
        };
        Ok(meta)
    }

    async fn list_top(&self, limit: i64) -> Result<Vec<ContentMeta>> {
        let sql = format!(
            "SELECT {} FROM content_meta ORDER BY views DESC, slug ASC LIMIT ?",
            META_COLUMNS
        );
        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(limit)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list view counters")?
                .into_iter()
                .map(|row| ContentMeta {
                    id: row.get("id"),
                    slug: row.get("slug"),
                    views: row.get("views"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(limit)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list view counters")?
                .into_iter()
                .map(|row| ContentMeta {
                    id: row.get("id"),
                    slug: row.get("slug"),
                    views: row.get("views"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
                .collect(),
        };
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxContentMetaRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxContentMetaRepository::new(pool)
    }

    #[tokio::test]
    async fn test_increment_creates_then_counts() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_slug("blog/hello").await.unwrap().is_none());
        assert_eq!(repo.increment_views("blog/hello").await.unwrap(), 1);
        assert_eq!(repo.increment_views("blog/hello").await.unwrap(), 2);
        assert_eq!(repo.get_by_slug("blog/hello").await.unwrap().unwrap().views, 2);
    }

    #[tokio::test]
    async fn test_list_top() {
        let repo = setup_test_repo().await;
        for _ in 0..3 {
            repo.increment_views("popular").await.unwrap();
        }
        repo.increment_views("quiet").await.unwrap();

        let top = repo.list_top(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].slug, "popular");
        assert_eq!(top[0].views, 3);
    }
}
