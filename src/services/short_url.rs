//! Short link management and resolution

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::ShortUrlRepository;
use crate::models::{
    CreateShortUrlInput, LinkState, ListParams, PagedResult, ShortUrl, UpdateShortUrlInput,
};
use crate::services::click::ClickTracker;
use crate::services::og::OgFetcher;
use anyhow::Context;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

pub const RANDOM_SLUG_LENGTH: usize = 7;
const MAX_SLUG_ATTEMPTS: usize = 10;
const BASE62: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const LINK_CACHE_TTL: Duration = Duration::from_secs(60);

/// Slugs that would shadow routes or confuse readers
const RESERVED_SLUGS: &[&str] = &[
    "admin", "api", "auth", "blog", "blogs", "dashboard", "edge", "direct", "fast",
    "feed", "feed.xml", "gallery", "health", "login", "logout", "projects", "register",
    "s", "static", "tags", "ultra-fast",
];

const CUSTOM_SLUG_PATTERN: &str = r"^[A-Za-z0-9_-]{1,64}$";

static CUSTOM_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(CUSTOM_SLUG_PATTERN).expect("custom slug pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum ShortUrlServiceError {
    #[error("Short URL not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of looking a slug up for a redirect
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Active(ShortUrl),
    NotFound,
    Inactive,
    Expired,
}

impl Lookup {
    pub fn at(link: Option<ShortUrl>, now: DateTime<Utc>) -> Self {
        match link {
            None => Lookup::NotFound,
            Some(link) => match link.state_at(now) {
                LinkState::Active => Lookup::Active(link),
                LinkState::Inactive => Lookup::Inactive,
                LinkState::Expired => Lookup::Expired,
            },
        }
    }

    pub fn into_active(self) -> Option<ShortUrl> {
        match self {
            Lookup::Active(link) => Some(link),
            _ => None,
        }
    }
}

pub struct ShortUrlService {
    repo: Arc<dyn ShortUrlRepository>,
    clicks: ClickTracker,
    cache: Arc<Cache>,
    og: Option<Arc<OgFetcher>>,
}

impl ShortUrlService {
    pub fn new(repo: Arc<dyn ShortUrlRepository>, cache: Arc<Cache>) -> Self {
        Self {
            clicks: ClickTracker::new(repo.clone()),
            repo,
            cache,
            og: None,
        }
    }

    /// Capture link-preview metadata in the background after each create
    pub fn with_og(mut self, og: Arc<OgFetcher>) -> Self {
        self.og = Some(og);
        self
    }

    pub fn clicks(&self) -> &ClickTracker {
        &self.clicks
    }

    pub async fn create(
        &self,
        input: CreateShortUrlInput,
        created_by: Option<i64>,
    ) -> Result<ShortUrl, ShortUrlServiceError> {
        let destination = validate_destination(&input.destination)?;
        let now = Utc::now();
        if input.expires_at.is_some_and(|at| at <= now) {
            return Err(ShortUrlServiceError::ValidationError(
                "Expiry must be in the future".to_string(),
            ));
        }

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => {
                validate_custom_slug(custom)?;
                if self.repo.exists_by_slug(custom).await? {
                    return Err(ShortUrlServiceError::DuplicateSlug(custom.to_string()));
                }
                custom.to_string()
            }
            None => self.random_unused_slug().await?,
        };

        let link = ShortUrl {
            id: 0,
            slug,
            destination,
            title: input.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            clicks: 0,
            is_active: input.is_active.unwrap_or(true),
            expires_at: input.expires_at,
            og_title: None,
            og_description: None,
            og_image: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        let created = self.repo.create(&link).await.context("Failed to create short URL")?;
        tracing::info!("Created short link '{}' -> {}", created.slug, created.destination);

        self.capture_og(&created);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<ShortUrl, ShortUrlServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get short URL")?
            .ok_or_else(|| ShortUrlServiceError::NotFound(format!("id {}", id)))
    }

    /// Newest first
    pub async fn list(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<ShortUrl>, ShortUrlServiceError> {
        let (items, total) = self.repo.list(params).await.context("Failed to list short URLs")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateShortUrlInput,
    ) -> Result<ShortUrl, ShortUrlServiceError> {
        let mut link = self.get(id).await?;
        let mut destination_changed = false;

        if let Some(destination) = input.destination {
            let destination = validate_destination(&destination)?;
            destination_changed = destination != link.destination;
            link.destination = destination;
        }
        if let Some(title) = input.title {
            link.title = Some(title.trim().to_string()).filter(|t| !t.is_empty());
        }
        if let Some(is_active) = input.is_active {
            link.is_active = is_active;
        }
        if let Some(expires_at) = input.expires_at {
            link.expires_at = expires_at;
        }

        let updated = self.repo.update(&link).await.context("Failed to update short URL")?;
        self.forget(&updated.slug).await;
        if destination_changed {
            self.capture_og(&updated);
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ShortUrlServiceError> {
        let link = self.get(id).await?;
        if !self.repo.delete(id).await.context("Failed to delete short URL")? {
            return Err(ShortUrlServiceError::NotFound(format!("id {}", id)));
        }
        self.forget(&link.slug).await;
        Ok(())
    }

    /// Look a slug up for redirecting
    pub async fn resolve(&self, slug: &str, now: DateTime<Utc>) -> anyhow::Result<Lookup> {
        let link = self
            .repo
            .get_by_slug(slug)
            .await
            .with_context(|| format!("Failed to look up short link '{}'", slug))?;
        Ok(Lookup::at(link, now))
    }

    /// Like [`resolve`](Self::resolve), but serves active links from cache
    ///
    /// Only active links are cached, and expiry is re-checked on every hit.
    pub async fn resolve_cached(&self, slug: &str, now: DateTime<Utc>) -> anyhow::Result<Lookup> {
        let cache_key = link_cache_key(slug);
        if let Ok(Some(cached)) = self.cache.get::<ShortUrl>(&cache_key).await {
            return Ok(Lookup::at(Some(cached), now));
        }

        let lookup = self.resolve(slug, now).await?;
        if let Lookup::Active(link) = &lookup {
            let _ = self.cache.set(&cache_key, link, LINK_CACHE_TTL).await;
        }
        Ok(lookup)
    }

    /// Count a click and wait for the write
    pub async fn record_click(&self, link_id: i64) -> anyhow::Result<bool> {
        self.clicks.record(link_id).await
    }

    async fn random_unused_slug(&self) -> Result<String, ShortUrlServiceError> {
        for _ in 0..MAX_SLUG_ATTEMPTS {
            let candidate = random_slug(RANDOM_SLUG_LENGTH);
            if !self.repo.exists_by_slug(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(anyhow::anyhow!("No free slug after {} attempts", MAX_SLUG_ATTEMPTS).into())
    }

    fn capture_og(&self, link: &ShortUrl) {
        let Some(og) = self.og.clone() else {
            return;
        };
        let repo = self.repo.clone();
        let (id, destination) = (link.id, link.destination.clone());
        tokio::spawn(async move {
            match og.fetch(&destination).await {
                Ok(metadata) if !metadata.is_empty() => {
                    if let Err(e) = repo.set_og(id, &metadata).await {
                        tracing::warn!("Failed to store OG metadata for link {}: {:#}", id, e);
                    }
                }
                Ok(_) => tracing::debug!("No OG metadata at {}", destination),
                Err(e) => tracing::warn!("OG fetch failed for {}: {:#}", destination, e),
            }
        });
    }

    async fn forget(&self, slug: &str) {
        let _ = self.cache.delete(&link_cache_key(slug)).await;
    }
}

fn link_cache_key(slug: &str) -> String {
    format!("short:{}", slug)
}

/// Random base62 slug
pub fn random_slug(length: usize) -> String {
    std::iter::repeat_with(|| BASE62[rand::random_range(0..BASE62.len())] as char)
        .take(length)
        .collect()
}

fn validate_custom_slug(slug: &str) -> Result<(), ShortUrlServiceError> {
    if !CUSTOM_SLUG.is_match(slug) {
        return Err(ShortUrlServiceError::ValidationError(
            "Slug may only contain letters, digits, '-' and '_' (1-64 characters)".to_string(),
        ));
    }
    if RESERVED_SLUGS.contains(&slug.to_ascii_lowercase().as_str()) {
        return Err(ShortUrlServiceError::ValidationError(format!(
            "Slug '{}' is reserved",
            slug
        )));
    }
    Ok(())
}

fn validate_destination(destination: &str) -> Result<String, ShortUrlServiceError> {
    let destination = destination.trim();
    let url = reqwest::Url::parse(destination).map_err(|_| {
        ShortUrlServiceError::ValidationError(format!("Invalid URL: '{}'", destination))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ShortUrlServiceError::ValidationError(
            "Destination must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(destination.to_string())
}
