//! Open Graph extraction for link previews
//!
//! Fetches a page, reads `og:*` meta tags (falling back to `<title>` and the
//! plain description meta tag) and caches the result per URL.

use crate::cache::{Cache, CacheLayer};
use crate::models::OgMetadata;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Only the head of a page matters; stop reading after this many bytes
const MAX_BODY_BYTES: usize = 512 * 1024;
const OG_CACHE_TTL: Duration = Duration::from_secs(3600);

const META_TAG_PATTERN: &str = r"(?is)<meta\s[^>]*>";
const ATTRIBUTE_PATTERN: &str = r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#;
const TITLE_TAG_PATTERN: &str = r"(?is)<title[^>]*>(.*?)</title>";

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(META_TAG_PATTERN).expect("meta tag pattern is valid"));
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(ATTRIBUTE_PATTERN).expect("attribute pattern is valid"));
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(TITLE_TAG_PATTERN).expect("title pattern is valid"));

pub struct OgFetcher {
    client: reqwest::Client,
    cache: Arc<Cache>,
}

impl OgFetcher {
    pub fn new(cache: Arc<Cache>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio-og/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, cache })
    }

    /// Metadata for `url`, served from cache when fetched recently
    pub async fn fetch(&self, url: &str) -> Result<OgMetadata> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Only http(s) URLs can be previewed: {}", url);
        }

        let cache_key = format!("og:{}", url);
        if let Ok(Some(cached)) = self.cache.get::<OgMetadata>(&cache_key).await {
            tracing::debug!("OG metadata served from cache: {}", url);
            return Ok(cached);
        }

        let html = self.fetch_head(url).await?;
        let metadata = parse_og(&html);
        let _ = self.cache.set(&cache_key, &metadata, OG_CACHE_TTL).await;
        Ok(metadata)
    }

    async fn fetch_head(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad status from {}", url))?;

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.context("Failed to read response body")? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_BODY_BYTES || contains_head_end(&body) {
                break;
            }
        }
        body.truncate(MAX_BODY_BYTES);
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn contains_head_end(body: &[u8]) -> bool {
    body.windows(7).any(|w| w.eq_ignore_ascii_case(b"</head>"))
}

/// Pull link-preview fields out of an HTML document
pub fn parse_og(html: &str) -> OgMetadata {
    let mut values: HashMap<String, String> = HashMap::new();
    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = cap[1].to_ascii_lowercase();
            let value = cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str());
            match name.as_str() {
                "property" | "name" => key = value.map(str::to_ascii_lowercase),
                "content" => content = value,
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            let content = decode_entities(content.trim());
            if !content.is_empty() {
                values.entry(key).or_insert(content);
            }
        }
    }

    let title_tag = TITLE_TAG
        .captures(html)
        .map(|cap| decode_entities(cap[1].trim()))
        .filter(|t| !t.is_empty());

    OgMetadata {
        title: values
            .remove("og:title")
            .or_else(|| values.remove("twitter:title"))
            .or(title_tag),
        description: values
            .remove("og:description")
            .or_else(|| values.remove("twitter:description"))
            .or_else(|| values.remove("description")),
        image: values
            .remove("og:image")
            .or_else(|| values.remove("og:image:url"))
            .or_else(|| values.remove("twitter:image")),
        site_name: values.remove("og:site_name"),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_patterns_compile() {
        for pattern in [META_TAG_PATTERN, ATTRIBUTE_PATTERN, TITLE_TAG_PATTERN] {
            assert!(Regex::new(pattern).is_ok(), "{}", pattern);
        }
    }

    #[test]
    fn test_parse_og_tags() {
        let html = r#"<html><head>
            <title>Fallback</title>
            <meta property="og:title" content="Tom &amp; Jerry">
            <meta content='A cartoon' property='og:description' />
            <meta property="og:image" content="https://cdn.example.com/a.png">
            <meta property="og:site_name" content="Example">
        </head></html>"#;
        let og = parse_og(html);
        assert_eq!(og.title.as_deref(), Some("Tom & Jerry"));
        assert_eq!(og.description.as_deref(), Some("A cartoon"));
        assert_eq!(og.image.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(og.site_name.as_deref(), Some("Example"));
    }

    #[test]
    fn test_parse_fallbacks() {
        let html = r#"<head><TITLE> Plain page </TITLE>
            <meta name="description" content="Just a page">
            <meta name="twitter:image" content="/img.png"></head>"#;
        let og = parse_og(html);
        assert_eq!(og.title.as_deref(), Some("Plain page"));
        assert_eq!(og.description.as_deref(), Some("Just a page"));
        assert_eq!(og.image.as_deref(), Some("/img.png"));
        assert!(parse_og("<html></html>").is_empty());
    }

    #[test]
    fn test_first_tag_wins() {
        let html = r#"<meta property="og:title" content="One"><meta property="og:title" content="Two">"#;
        assert_eq!(parse_og(html).title.as_deref(), Some("One"));
    }

    #[test]
    fn test_head_end_detection() {
        assert!(contains_head_end(b"<html><HEAD></HEAD>"));
        assert!(!contains_head_end(b"<html><head>"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let fetcher = OgFetcher::new(Arc::new(MemoryCache::new()), Duration::from_secs(1)).unwrap();
        assert!(fetcher.fetch("ftp://example.com").await.is_err());
        assert!(fetcher.fetch("javascript:alert(1)").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_uses_cache() {
        let cache = Arc::new(MemoryCache::new());
        let cached = OgMetadata {
            title: Some("Cached".into()),
            ..Default::default()
        };
        cache
            .set("og:https://unreachable.invalid/", &cached, Duration::from_secs(60))
            .await
            .unwrap();
        let fetcher = OgFetcher::new(cache, Duration::from_millis(100)).unwrap();
        let og = fetcher.fetch("https://unreachable.invalid/").await.unwrap();
        assert_eq!(og, cached);
    }
}
