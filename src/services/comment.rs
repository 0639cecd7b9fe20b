//! Comment service
//!
//! Comments attach to published posts only. A reply must point at a
//! top-level comment on the same post, so threads are at most two deep.

use crate::db::repositories::{BlogRepository, CommentRepository};
use crate::models::{Blog, Comment, CommentThread, CreateCommentInput};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 100;
const MAX_CONTENT_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    blogs: Arc<dyn BlogRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, blogs: Arc<dyn BlogRepository>) -> Self {
        Self { repo, blogs }
    }

    /// Add a comment to the published post `blog_slug`
    pub async fn create(
        &self,
        blog_slug: &str,
        input: CreateCommentInput,
    ) -> Result<CommentThread, CommentServiceError> {
        let blog = self.published_blog(blog_slug).await?;

        let author_name = input.author_name.trim();
        if author_name.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Name cannot be empty".to_string(),
            ));
        }
        if author_name.chars().count() > MAX_NAME_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Name must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        let content = input.content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be at most {} characters",
                MAX_CONTENT_LENGTH
            )));
        }
        let author_email = input
            .author_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if let Some(email) = &author_email {
            if !email.contains('@') {
                return Err(CommentServiceError::ValidationError(
                    "Invalid email format".to_string(),
                ));
            }
        }

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .repo
                .get_by_id(parent_id)
                .await
                .context("Failed to get parent comment")?
                .filter(|p| p.blog_id == blog.id)
                .ok_or_else(|| {
                    CommentServiceError::ValidationError(format!(
                        "Parent comment {} does not exist on this post",
                        parent_id
                    ))
                })?;
            if parent.is_reply() {
                return Err(CommentServiceError::ValidationError(
                    "Replies cannot be nested".to_string(),
                ));
            }
        }

        let comment = Comment {
            id: 0,
            blog_id: blog.id,
            parent_id: input.parent_id,
            author_name: author_name.to_string(),
            author_email,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let created = self.repo.create(&comment).await.context("Failed to create comment")?;
        tracing::debug!("Comment {} added to '{}'", created.id, blog.slug);
        Ok(CommentThread::from_comment(created))
    }

    /// Threads for a published post, oldest first
    pub async fn list_for_blog(
        &self,
        blog_slug: &str,
    ) -> Result<Vec<CommentThread>, CommentServiceError> {
        let blog = self.published_blog(blog_slug).await?;
        let comments = self
            .repo
            .list_by_blog(blog.id)
            .await
            .context("Failed to list comments")?;
        Ok(CommentThread::build(comments))
    }

    pub async fn count_for_blog(&self, blog_id: i64) -> Result<i64, CommentServiceError> {
        Ok(self
            .repo
            .count_by_blog(blog_id)
            .await
            .context("Failed to count comments")?)
    }

    /// Removes the comment and its replies
    pub async fn delete(&self, id: i64) -> Result<(), CommentServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete comment")? {
            return Err(CommentServiceError::NotFound(format!("comment {}", id)));
        }
        Ok(())
    }

    async fn published_blog(&self, slug: &str) -> Result<Blog, CommentServiceError> {
        self.blogs
            .get_by_slug(slug)
            .await
            .context("Failed to get blog")?
            .filter(Blog::is_published)
            .ok_or_else(|| CommentServiceError::NotFound(format!("blog '{}'", slug)))
    }
}
