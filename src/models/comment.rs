//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored comment; `parent_id` points at a top-level comment for replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub blog_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    #[serde(skip_serializing)]
    pub author_email: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A top-level comment with its replies, ready for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: i64,
    pub blog_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub avatar_url: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    pub fn from_comment(comment: Comment) -> Self {
        Self {
            id: comment.id,
            blog_id: comment.blog_id,
            parent_id: comment.parent_id,
            avatar_url: gravatar_url(comment.author_email.as_deref()),
            author_name: comment.author_name,
            content: comment.content,
            created_at: comment.created_at,
            replies: Vec::new(),
        }
    }

    /// Group a flat, oldest-first comment list into threads
    ///
    /// Replies whose parent is missing from `comments` are dropped.
    pub fn build(comments: Vec<Comment>) -> Vec<CommentThread> {
        let (roots, replies): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.parent_id.is_none());

        let mut threads: Vec<CommentThread> =
            roots.into_iter().map(CommentThread::from_comment).collect();

        for reply in replies {
            if let Some(parent) = threads.iter_mut().find(|t| Some(t.id) == reply.parent_id) {
                parent.replies.push(CommentThread::from_comment(reply));
            }
        }

        threads
    }
}

/// Gravatar URL for an email, or the mystery-person default
pub fn gravatar_url(email: Option<&str>) -> String {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => {
            let hash = format!("{:x}", md5::compute(email.to_lowercase()));
            format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
        }
        None => "https://www.gravatar.com/avatar/?d=mp&s=80".to_string(),
    }
}

/// A new comment; the target post comes from the request path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommentInput {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub content: String,
}
