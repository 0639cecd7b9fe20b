//! Short-link click counting
//!
//! Counts go straight to the database as a single `clicks = clicks + 1`
//! statement, so concurrent redirects never lose or reverse an increment.

use crate::db::repositories::ShortUrlRepository;
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ClickTracker {
    repo: Arc<dyn ShortUrlRepository>,
}

impl ClickTracker {
    pub fn new(repo: Arc<dyn ShortUrlRepository>) -> Self {
        Self { repo }
    }

    /// Count one click and wait for the write; `false` if the link is gone
    pub async fn record(&self, link_id: i64) -> Result<bool> {
        self.repo
            .increment_clicks(link_id)
            .await
            .with_context(|| format!("Failed to count click for link {}", link_id))
    }

    /// Count one click without holding up the response
    ///
    /// Failures are logged and dropped.
    pub fn record_in_background(&self, link_id: i64) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            match tracker.record(link_id).await {
                Ok(true) => tracing::debug!("Counted click for link {}", link_id),
                Ok(false) => tracing::warn!("Click dropped: link {} no longer exists", link_id),
                Err(e) => tracing::warn!("Click dropped for link {}: {:#}", link_id, e),
            }
        })
    }
}
