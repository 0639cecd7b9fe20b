//! Page view counters keyed by content slug

use crate::db::repositories::ContentMetaRepository;
use crate::models::ContentMeta;
use anyhow::{Context, Result};
use std::sync::Arc;

const MAX_SLUG_LENGTH: usize = 255;

pub struct ContentMetaService {
    repo: Arc<dyn ContentMetaRepository>,
}

impl ContentMetaService {
    pub fn new(repo: Arc<dyn ContentMetaRepository>) -> Self {
        Self { repo }
    }

    /// Count one view and return the new total
    pub async fn record_view(&self, slug: &str) -> Result<i64> {
        let slug = normalize(slug)?;
        self.repo
            .increment_views(&slug)
            .await
            .with_context(|| format!("Failed to record view for '{}'", slug))
    }

    /// Views so far; unknown slugs have zero
    pub async fn views(&self, slug: &str) -> Result<i64> {
        let slug = normalize(slug)?;
        Ok(self
            .repo
            .get_by_slug(&slug)
            .await
            .context("Failed to get view count")?
            .map(|m| m.views)
            .unwrap_or(0))
    }

    pub async fn most_viewed(&self, limit: i64) -> Result<Vec<ContentMeta>> {
        self.repo.list_top(limit.clamp(1, 100)).await
    }
}

fn normalize(slug: &str) -> Result<String> {
    let slug = slug.trim();
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        anyhow::bail!("Invalid content slug");
    }
    Ok(slug.to_string())
}
