//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Words per minute used for the reading-time estimate
const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    /// Markdown or HTML body, stored as written
    pub content: String,
    pub cover_image: Option<String>,
    pub status: BlogStatus,
    pub author_id: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn is_published(&self) -> bool {
        self.status == BlogStatus::Published
    }

    /// Estimated reading time in whole minutes, never less than one
    pub fn reading_time_minutes(&self) -> u32 {
        let words = self.content.split_whitespace().count();
        words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
    }

    /// The excerpt, or the first 160 characters of the body
    pub fn summary(&self) -> String {
        match &self.excerpt {
            Some(excerpt) if !excerpt.trim().is_empty() => excerpt.clone(),
            _ => {
                let text: String = self.content.chars().take(160).collect();
                if self.content.chars().count() > 160 {
                    format!("{}…", text.trim_end())
                } else {
                    text
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    /// Visible only in the dashboard
    #[default]
    Draft,
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(BlogStatus::Draft),
            "published" => Ok(BlogStatus::Published),
            _ => Err(anyhow::anyhow!("Invalid blog status: {}", s)),
        }
    }
}

/// Input for creating a blog post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    /// Generated from the title when empty
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: Option<BlogStatus>,
    /// Tag names; unknown names are created
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of a blog post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<BlogStatus>,
    /// Replaces the full tag set when present
    pub tags: Option<Vec<String>>,
}

/// Filters for listing blog posts
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub status: Option<BlogStatus>,
    /// Tag slug
    pub tag: Option<String>,
}

impl BlogFilter {
    pub fn published() -> Self {
        Self {
            status: Some(BlogStatus::Published),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag.filter(|t| !t.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog_with(content: &str, excerpt: Option<&str>) -> Blog {
        let now = Utc::now();
        Blog {
            id: 1,
            slug: "post".to_string(),
            title: "Post".to_string(),
            excerpt: excerpt.map(String::from),
            content: content.to_string(),
            cover_image: None,
            status: BlogStatus::Draft,
            author_id: 1,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(blog_with("", None).reading_time_minutes(), 1);
        assert_eq!(blog_with(&"word ".repeat(200), None).reading_time_minutes(), 1);
        assert_eq!(blog_with(&"word ".repeat(201), None).reading_time_minutes(), 2);
    }

    #[test]
    fn test_summary_prefers_excerpt() {
        assert_eq!(blog_with("body", Some("short")).summary(), "short");
        assert_eq!(blog_with("body", Some("  ")).summary(), "body");
        let long = "a".repeat(300);
        let summary = blog_with(&long, None).summary();
        assert!(summary.ends_with('…'));
        assert_eq!(summary.chars().count(), 161);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Published".parse::<BlogStatus>().unwrap(), BlogStatus::Published);
        assert!("archived".parse::<BlogStatus>().is_err());
    }
}
