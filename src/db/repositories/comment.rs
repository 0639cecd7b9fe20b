//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Every comment on a blog, oldest first
    async fn list_by_blog(&self, blog_id: i64) -> Result<Vec<Comment>>;

    async fn count_by_blog(&self, blog_id: i64) -> Result<i64>;

    /// Deletes the comment and, by cascade, its replies
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_COLUMNS: &str = "id, blog_id, parent_id, author_name, author_email, content, created_at";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_comment_sqlite(self.pool.sqlite()?, comment).await,
            DatabaseDriver::Mysql => create_comment_mysql(self.pool.mysql()?, comment).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let comment = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get comment")?
                .as_ref()
                .map(row_to_comment_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get comment")?
                .as_ref()
                .map(row_to_comment_mysql),
        };
        Ok(comment)
    }

    async fn list_by_blog(&self, blog_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE blog_id = ? ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        );
        let comments = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(blog_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_comment_sqlite)
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(blog_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_comment_mysql)
                .collect(),
        };
        Ok(comments)
    }

    async fn count_by_blog(&self, blog_id: i64) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) AS count FROM comments WHERE blog_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(blog_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count comments")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(blog_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count comments")?
                .get("count"),
        };
        Ok(count)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (blog_id, parent_id, author_name, author_email, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.blog_id)
    .bind(comment.parent_id)
    .bind(&comment.author_name)
    .bind(&comment.author_email)
    .bind(&comment.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        created_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        parent_id: row.get("parent_id"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(pool: &MySqlPool, comment: &Comment) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (blog_id, parent_id, author_name, author_email, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.blog_id)
    .bind(comment.parent_id)
    .bind(&comment.author_name)
    .bind(&comment.author_email)
    .bind(&comment.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..comment.clone()
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        parent_id: row.get("parent_id"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCommentRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ('a', 'a@x.dev', 'h')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO blogs (slug, title, content, author_id) VALUES ('one', 'One', 'c', 1), ('two', 'Two', 'c', 1)",
        )
        .execute(sqlite)
        .await
        .unwrap();
        SqlxCommentRepository::new(pool)
    }

    fn comment(blog_id: i64, parent_id: Option<i64>, name: &str) -> Comment {
        Comment {
            id: 0,
            blog_id,
            parent_id,
            author_name: name.to_string(),
            author_email: Some(format!("{}@example.com", name)),
            content: "Nice post".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_oldest_first() {
        let repo = setup_test_repo().await;
        let root = repo.create(&comment(1, None, "ada")).await.unwrap();
        repo.create(&comment(1, Some(root.id), "bob")).await.unwrap();
        repo.create(&comment(2, None, "cy")).await.unwrap();

        let comments = repo.list_by_blog(1).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author_name, "ada");
        assert_eq!(comments[1].parent_id, Some(root.id));
        assert_eq!(repo.count_by_blog(2).await.unwrap(), 1);

        let fetched = repo.get_by_id(root.id).await.unwrap().unwrap();
        assert_eq!(fetched.author_email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_replies() {
        let repo = setup_test_repo().await;
        let root = repo.create(&comment(1, None, "ada")).await.unwrap();
        let reply = repo.create(&comment(1, Some(root.id), "bob")).await.unwrap();

        assert!(repo.delete(root.id).await.unwrap());
        assert!(repo.get_by_id(reply.id).await.unwrap().is_none());
        assert!(!repo.delete(root.id).await.unwrap());
    }
}
