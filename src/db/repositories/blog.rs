//! Blog repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Blog, BlogFilter, BlogStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, blog: &Blog) -> Result<Blog>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>>;

    /// Newest first; returns the page and the total matching count
    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<(Vec<Blog>, i64)>;

    /// Persist every mutable field of `blog`
    async fn update(&self, blog: &Blog) -> Result<Blog>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Whether another blog (not `exclude_id`) already uses `slug`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Replace the blog's tag set
    async fn set_tags(&self, blog_id: i64, tag_ids: &[i64]) -> Result<()>;
}

pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const BLOG_COLUMNS: &str = "b.id, b.slug, b.title, b.excerpt, b.content, b.cover_image, b.status, \
                            b.author_id, b.published_at, b.created_at, b.updated_at";

/// WHERE clause for a filter; bind status first, then tag slug
fn filter_clause(filter: &BlogFilter) -> String {
    let mut conditions = Vec::new();
    if filter.status.is_some() {
        conditions.push("b.status = ?");
    }
    if filter.tag.is_some() {
        conditions.push(
            "EXISTS (SELECT 1 FROM blog_tags bt INNER JOIN tags t ON t.id = bt.tag_id \
             WHERE bt.blog_id = b.id AND t.slug = ?)",
        );
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_blog_sqlite(self.pool.sqlite()?, blog).await,
            DatabaseDriver::Mysql => create_blog_mysql(self.pool.mysql()?, blog).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        let sql = format!("SELECT {} FROM blogs b WHERE b.id = ?", BLOG_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get blog by ID")?;
                row.as_ref().map(row_to_blog_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get blog by ID")?;
                row.as_ref().map(row_to_blog_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>> {
        let sql = format!("SELECT {} FROM blogs b WHERE b.slug = ?", BLOG_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get blog by slug")?;
                row.as_ref().map(row_to_blog_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get blog by slug")?;
                row.as_ref().map(row_to_blog_mysql).transpose()
            }
        }
    }

    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<(Vec<Blog>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_blogs_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_blogs_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        const SQL: &str = r#"
            UPDATE blogs
            SET slug = ?, title = ?, excerpt = ?, content = ?, cover_image = ?,
                status = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&blog.slug)
                    .bind(&blog.title)
                    .bind(&blog.excerpt)
                    .bind(&blog.content)
                    .bind(&blog.cover_image)
                    .bind(blog.status.as_str())
                    .bind(blog.published_at)
                    .bind(now)
                    .bind(blog.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update blog")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&blog.slug)
                    .bind(&blog.title)
                    .bind(&blog.excerpt)
                    .bind(&blog.content)
                    .bind(&blog.cover_image)
                    .bind(blog.status.as_str())
                    .bind(blog.published_at)
                    .bind(now)
                    .bind(blog.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update blog")?;
            }
        }
        Ok(Blog {
            updated_at: now,
            ..blog.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM blogs WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete blog")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete blog")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) AS count FROM blogs WHERE slug = ? AND id != ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check blog slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check blog slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn set_tags(&self, blog_id: i64, tag_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_tags_sqlite(self.pool.sqlite()?, blog_id, tag_ids).await,
            DatabaseDriver::Mysql => set_tags_mysql(self.pool.mysql()?, blog_id, tag_ids).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (slug, title, excerpt, content, cover_image, status, author_id,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.cover_image)
    .bind(blog.status.as_str())
    .bind(blog.author_id)
    .bind(blog.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..blog.clone()
    })
}

async fn list_blogs_sqlite(
    pool: &SqlitePool,
    filter: &BlogFilter,
    params: &ListParams,
) -> Result<(Vec<Blog>, i64)> {
    let where_clause = filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) AS count FROM blogs b {}", where_clause);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = filter.status {
        count_query = count_query.bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        count_query = count_query.bind(tag);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count blogs")?
        .get("count");

    let list_sql = format!(
        "SELECT {} FROM blogs b {} \
         ORDER BY COALESCE(b.published_at, b.created_at) DESC, b.id DESC LIMIT ? OFFSET ?",
        BLOG_COLUMNS, where_clause
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(status) = filter.status {
        list_query = list_query.bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        list_query = list_query.bind(tag);
    }
    let rows = list_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blogs")?;

    let blogs = rows.iter().map(row_to_blog_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((blogs, total))
}

async fn set_tags_sqlite(pool: &SqlitePool, blog_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM blog_tags WHERE blog_id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear blog tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO blog_tags (blog_id, tag_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag to blog")?;
    }
    tx.commit().await?;
    Ok(())
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        cover_image: row.get("cover_image"),
        status: BlogStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (slug, title, excerpt, content, cover_image, status, author_id,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.cover_image)
    .bind(blog.status.as_str())
    .bind(blog.author_id)
    .bind(blog.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..blog.clone()
    })
}

async fn list_blogs_mysql(
    pool: &MySqlPool,
    filter: &BlogFilter,
    params: &ListParams,
) -> Result<(Vec<Blog>, i64)> {
    let where_clause = filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) AS count FROM blogs b {}", where_clause);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = filter.status {
        count_query = count_query.bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        count_query = count_query.bind(tag);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count blogs")?
        .get("count");

    let list_sql = format!(
        "SELECT {} FROM blogs b {} \
         ORDER BY COALESCE(b.published_at, b.created_at) DESC, b.id DESC LIMIT ? OFFSET ?",
        BLOG_COLUMNS, where_clause
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(status) = filter.status {
        list_query = list_query.bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        list_query = list_query.bind(tag);
    }
    let rows = list_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blogs")?;

    let blogs = rows.iter().map(row_to_blog_mysql).collect::<Result<Vec<_>>>()?;
    Ok((blogs, total))
}

async fn set_tags_mysql(pool: &MySqlPool, blog_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM blog_tags WHERE blog_id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear blog tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT IGNORE INTO blog_tags (blog_id, tag_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag to blog")?;
    }
    tx.commit().await?;
    Ok(())
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        cover_image: row.get("cover_image"),
        status: BlogStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
