//! Project repository
//!
//! `tech_stack` is stored as a JSON array in a text column.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Project;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> Result<Project>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>>;

    /// Ordered by `sort_order`, then newest
    async fn list(&self, featured_only: bool) -> Result<Vec<Project>>;

    async fn update(&self, project: &Project) -> Result<Project>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxProjectRepository {
    pool: DynDatabasePool,
}

impl SqlxProjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProjectRepository> {
        Arc::new(Self::new(pool))
    }
}

const PROJECT_COLUMNS: &str = "id, slug, title, description, content, tech_stack, github_url, \
                               live_url, image_url, featured, sort_order, created_at, updated_at";

fn encode_stack(stack: &[String]) -> Result<String> {
    serde_json::to_string(stack).context("Failed to encode tech stack")
}

fn decode_stack(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl ProjectRepository for SqlxProjectRepository {
    async fn create(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_project_sqlite(self.pool.sqlite()?, project).await,
            DatabaseDriver::Mysql => create_project_mysql(self.pool.mysql()?, project).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        let project = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get project by ID")?
                .as_ref()
                .map(row_to_project_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get project by ID")?
                .as_ref()
                .map(row_to_project_mysql),
        };
        Ok(project)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE slug = ?", PROJECT_COLUMNS);
        let project = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get project by slug")?
                .as_ref()
                .map(row_to_project_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get project by slug")?
                .as_ref()
                .map(row_to_project_mysql),
        };
        Ok(project)
    }

    async fn list(&self, featured_only: bool) -> Result<Vec<Project>> {
        let sql = format!(
            "SELECT {} FROM projects {} ORDER BY sort_order ASC, created_at DESC, id DESC",
            PROJECT_COLUMNS,
            if featured_only { "WHERE featured = TRUE" } else { "" }
        );
        let projects = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list projects")?
                .iter()
                .map(row_to_project_sqlite)
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list projects")?
                .iter()
                .map(row_to_project_mysql)
                .collect(),
        };
        Ok(projects)
    }

    async fn update(&self, project: &Project) -> Result<Project> {
        const SQL: &str = r#"
            UPDATE projects
            SET slug = ?, title = ?, description = ?, content = ?, tech_stack = ?,
                github_url = ?, live_url = ?, image_url = ?, featured = ?, sort_order = ?,
                updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        let stack = encode_stack(&project.tech_stack)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&project.slug)
                    .bind(&project.title)
                    .bind(&project.description)
                    .bind(&project.content)
                    .bind(&stack)
                    .bind(&project.github_url)
                    .bind(&project.live_url)
                    .bind(&project.image_url)
                    .bind(project.featured)
                    .bind(project.sort_order)
                    .bind(now)
                    .bind(project.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update project")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&project.slug)
                    .bind(&project.title)
                    .bind(&project.description)
                    .bind(&project.content)
                    .bind(&stack)
                    .bind(&project.github_url)
                    .bind(&project.live_url)
                    .bind(&project.image_url)
                    .bind(project.featured)
                    .bind(project.sort_order)
                    .bind(now)
                    .bind(project.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update project")?;
            }
        }
        Ok(Project {
            updated_at: now,
            ..project.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM projects WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete project")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete project")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) AS count FROM projects WHERE slug = ? AND id != ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check project slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check project slug")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_project_sqlite(pool: &SqlitePool, project: &Project) -> Result<Project> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO projects (slug, title, description, content, tech_stack, github_url,
                              live_url, image_url, featured, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.slug)
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.content)
    .bind(encode_stack(&project.tech_stack)?)
    .bind(&project.github_url)
    .bind(&project.live_url)
    .bind(&project.image_url)
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..project.clone()
    })
}

fn row_to_project_sqlite(row: &sqlx::sqlite::SqliteRow) -> Project {
    let stack: String = row.get("tech_stack");
    Project {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        tech_stack: decode_stack(&stack),
        github_url: row.get("github_url"),
        live_url: row.get("live_url"),
        image_url: row.get("image_url"),
        featured: row.get("featured"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_project_mysql(pool: &MySqlPool, project: &Project) -> Result<Project> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO projects (slug, title, description, content, tech_stack, github_url,
                              live_url, image_url, featured, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.slug)
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.content)
    .bind(encode_stack(&project.tech_stack)?)
    .bind(&project.github_url)
    .bind(&project.live_url)
    .bind(&project.image_url)
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..project.clone()
    })
}

fn row_to_project_mysql(row: &sqlx::mysql::MySqlRow) -> Project {
    let stack: String = row.get("tech_stack");
    Project {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        tech_stack: decode_stack(&stack),
        github_url: row.get("github_url"),
        live_url: row.get("live_url"),
        image_url: row.get("image_url"),
        featured: row.get("featured"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
