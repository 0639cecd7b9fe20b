//! Tag repository
//!
//! Tags attach to blogs through the `blog_tags` join table; deleting a tag
//! removes its associations by cascade.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags with their published-blog counts, most used first
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Tags attached to a blog, by name
    async fn get_by_blog_id(&self, blog_id: i64) -> Result<Vec<Tag>>;
}

pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.sqlite()?, tag).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.mysql()?, tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        const SQL: &str = "SELECT id, name, slug, created_at FROM tags WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get tag by ID")?;
                Ok(row.as_ref().map(row_to_tag_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get tag by ID")?;
                Ok(row.as_ref().map(row_to_tag_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        const SQL: &str = "SELECT id, name, slug, created_at FROM tags WHERE slug = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get tag by slug")?;
                Ok(row.as_ref().map(row_to_tag_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get tag by slug")?;
                Ok(row.as_ref().map(row_to_tag_mysql))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        const SQL: &str = "SELECT id, name, slug, created_at FROM tags WHERE LOWER(name) = LOWER(?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(name)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get tag by name")?;
                Ok(row.as_ref().map(row_to_tag_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(name)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get tag by name")?;
                Ok(row.as_ref().map(row_to_tag_mysql))
            }
        }
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        const SQL: &str = r#"
            SELECT t.id, t.name, t.slug, t.created_at,
                   COUNT(b.id) AS blog_count
            FROM tags t
            LEFT JOIN blog_tags bt ON bt.tag_id = t.id
            LEFT JOIN blogs b ON b.id = bt.blog_id AND b.status = 'published'
            GROUP BY t.id, t.name, t.slug, t.created_at
            ORDER BY blog_count DESC, t.name ASC
        "#;
        let tags = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| TagWithCount {
                    tag: row_to_tag_sqlite(row),
                    blog_count: row.get("blog_count"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| TagWithCount {
                    tag: row_to_tag_mysql(row),
                    blog_count: row.get("blog_count"),
                })
                .collect(),
        };
        Ok(tags)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM tags WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_blog_id(&self, blog_id: i64) -> Result<Vec<Tag>> {
        const SQL: &str = r#"
            SELECT t.id, t.name, t.slug, t.created_at
            FROM tags t
            INNER JOIN blog_tags bt ON bt.tag_id = t.id
            WHERE bt.blog_id = ?
            ORDER BY t.name
        "#;
        let tags = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(blog_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get tags for blog")?
                .iter()
                .map(row_to_tag_sqlite)
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(blog_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get tags for blog")?
                .iter()
                .map(row_to_tag_mysql)
                .collect(),
        };
        Ok(tags)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: tag.name.clone(),
        slug: tag.slug.clone(),
        created_at: now,
    })
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: tag.name.clone(),
        slug: tag.slug.clone(),
        created_at: now,
    })
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (SqlxTagRepository, DynDatabasePool) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        (SqlxTagRepository::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, _) = setup_test_repo().await;
        let tag = repo
            .create(&Tag::new("Rust".to_string(), "rust".to_string()))
            .await
            .unwrap();
        assert!(tag.id > 0);

        assert_eq!(repo.get_by_id(tag.id).await.unwrap().unwrap().name, "Rust");
        assert_eq!(repo.get_by_slug("rust").await.unwrap().unwrap().id, tag.id);
        assert_eq!(repo.get_by_name("rust").await.unwrap().unwrap().id, tag.id);
        assert!(repo.get_by_slug("go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counts_only_published_blogs() {
        let (repo, pool) = setup_test_repo().await;
        let rust = repo.create(&Tag::new("Rust".into(), "rust".into())).await.unwrap();
        repo.create(&Tag::new("Go".into(), "go".into())).await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ('a', 'a@x.dev', 'h')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO blogs (slug, title, content, author_id, status) VALUES \
             ('one', 'One', 'c', 1, 'published'), ('two', 'Two', 'c', 1, 'draft')",
        )
        .execute(sqlite)
        .await
        .unwrap();
        sqlx::query("INSERT INTO blog_tags (blog_id, tag_id) VALUES (1, ?), (2, ?)")
            .bind(rust.id)
            .bind(rust.id)
            .execute(sqlite)
            .await
            .unwrap();

        let tags = repo.list_with_counts().await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag.slug, "rust");
        assert_eq!(tags[0].blog_count, 1);
        assert_eq!(tags[1].blog_count, 0);

        assert_eq!(repo.get_by_blog_id(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, _) = setup_test_repo().await;
        let tag = repo.create(&Tag::new("Rust".into(), "rust".into())).await.unwrap();
        assert!(repo.delete(tag.id).await.unwrap());
        assert!(!repo.delete(tag.id).await.unwrap());
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
    }
}
