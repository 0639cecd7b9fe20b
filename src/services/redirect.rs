//! Short-link redirects
//!
//! `/s/{slug}` runs the full decision tree: missing, inactive and expired
//! links are 404, crawlers get a hidden preview page (click counted before
//! responding) and people get the countdown page (click counted in the
//! background).
//!
//! The alternate handlers share one resolver and differ only in how long
//! they wait for the database, whether they consult the static redirect map
//! and the cache first, and how they answer.

use crate::config::{RedirectConfig, SiteConfig};
use crate::models::ShortUrl;
use crate::render::PageRenderer;
use crate::services::bot::is_bot;
use crate::services::short_url::{Lookup, ShortUrlService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const NOT_FOUND_MESSAGE: &str = "This link does not exist or is no longer available.";

/// What `/s/{slug}` should show
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NotFound,
    Bot(ShortUrl),
    Countdown { link: ShortUrl, seconds: u32 },
}

/// The redirect decision for a stored link (or its absence) at `now`
pub fn decide(
    link: Option<ShortUrl>,
    user_agent: Option<&str>,
    now: DateTime<Utc>,
    countdown_seconds: u32,
) -> Decision {
    match Lookup::at(link, now) {
        Lookup::Active(link) if is_bot(user_agent) => Decision::Bot(link),
        Lookup::Active(link) => Decision::Countdown {
            link,
            seconds: countdown_seconds,
        },
        Lookup::NotFound | Lookup::Inactive | Lookup::Expired => Decision::NotFound,
    }
}

/// The alternate redirect handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// 307 after a lookup bounded by `lookup_timeout_ms`
    Direct,
    /// Minimal meta-refresh page, `fast_timeout_ms`
    Fast,
    /// Static map, then a lookup bounded by `ultra_fast_timeout_ms`
    UltraFast,
    /// Static map, then cache, then a lookup bounded by `edge_timeout_ms`
    Edge,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Fast => "fast",
            Strategy::UltraFast => "ultra-fast",
            Strategy::Edge => "edge",
        }
    }

    pub fn timeout(&self, config: &RedirectConfig) -> Duration {
        let ms = match self {
            Strategy::Direct => config.lookup_timeout_ms,
            Strategy::Fast => config.fast_timeout_ms,
            Strategy::UltraFast => config.ultra_fast_timeout_ms,
            Strategy::Edge => config.edge_timeout_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    fn checks_static_map(&self) -> bool {
        matches!(self, Strategy::UltraFast | Strategy::Edge)
    }
}

/// How a redirect request is answered
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with an HTML body
    Page(String),
    /// Temporary redirect
    Location(String),
    /// 404 with an HTML body
    NotFound(String),
    /// 500 with an HTML body
    Error(String),
}

pub struct RedirectService {
    links: Arc<ShortUrlService>,
    pages: Arc<PageRenderer>,
    config: RedirectConfig,
    site: SiteConfig,
    base_url: String,
}

impl RedirectService {
    pub fn new(
        links: Arc<ShortUrlService>,
        pages: Arc<PageRenderer>,
        config: RedirectConfig,
        site: SiteConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            links,
            pages,
            config,
            site,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Answer `/s/{slug}` for the given user agent
    pub async fn short_link(&self, slug: &str, user_agent: Option<&str>) -> Reply {
        let now = Utc::now();
        let lookup = match self.links.resolve(slug, now).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::error!("Short link lookup failed for '{}': {:#}", slug, e);
                return self.error_reply(500, "Something went wrong. Please try again.");
            }
        };

        match decide(lookup.into_active(), user_agent, now, self.config.countdown_seconds) {
            Decision::NotFound => {
                tracing::debug!("Short link '{}' not followable", slug);
                self.error_reply(404, NOT_FOUND_MESSAGE)
            }
            Decision::Bot(link) => {
                if let Err(e) = self.links.record_click(link.id).await {
                    tracing::warn!("Click dropped for '{}': {:#}", link.slug, e);
                }
                let short_url = format!("{}/s/{}", self.base_url, link.slug);
                self.page_reply(self.pages.bot(&link, &short_url, &self.site))
            }
            Decision::Countdown { link, seconds } => {
                self.links.clicks().record_in_background(link.id);
                self.page_reply(self.pages.countdown(&link, seconds, &self.site))
            }
        }
    }

    /// Answer one of the alternate handlers
    ///
    /// Timeouts and lookup errors send the visitor to `fallback_url`.
    pub async fn follow(&self, strategy: Strategy, slug: &str) -> Reply {
        if strategy.checks_static_map() {
            if let Some(url) = self.config.static_redirects.get(slug) {
                tracing::debug!("{} redirect for '{}' from static map", strategy.name(), slug);
                return self.target_reply(strategy, url);
            }
        }

        let now = Utc::now();
        let lookup = async {
            match strategy {
                Strategy::Edge => self.links.resolve_cached(slug, now).await,
                _ => self.links.resolve(slug, now).await,
            }
        };

        match tokio::time::timeout(strategy.timeout(&self.config), lookup).await {
            Ok(Ok(Lookup::Active(link))) => {
                self.links.clicks().record_in_background(link.id);
                self.target_reply(strategy, &link.destination)
            }
            Ok(Ok(_)) => self.error_reply(404, NOT_FOUND_MESSAGE),
            Ok(Err(e)) => {
                tracing::warn!("{} lookup for '{}' failed: {:#}", strategy.name(), slug, e);
                self.target_reply(strategy, &self.config.fallback_url)
            }
            Err(_) => {
                tracing::warn!("{} lookup for '{}' timed out", strategy.name(), slug);
                self.target_reply(strategy, &self.config.fallback_url)
            }
        }
    }

    fn target_reply(&self, strategy: Strategy, url: &str) -> Reply {
        match strategy {
            Strategy::Fast => self.page_reply(self.pages.fast(url)),
            _ => Reply::Location(url.to_string()),
        }
    }

    fn page_reply(&self, rendered: anyhow::Result<String>) -> Reply {
        match rendered {
            Ok(html) => Reply::Page(html),
            Err(e) => {
                tracing::error!("Failed to render redirect page: {:#}", e);
                self.error_reply(500, "Something went wrong. Please try again.")
            }
        }
    }

    fn error_reply(&self, status: u16, message: &str) -> Reply {
        let body = self
            .pages
            .error_page(status, message, &self.site)
            .unwrap_or_else(|_| message.to_string());
        if status == 404 {
            Reply::NotFound(body)
        } else {
            Reply::Error(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // proptest's prelude also exports a `Strategy`
    use super::Strategy;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{ShortUrlRepository, SqlxShortUrlRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateShortUrlInput, ListParams, OgMetadata, UpdateShortUrlInput};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const CRAWLER: &str = "facebookexternalhit/1.1";

    fn link(is_active: bool, expires_in: Option<i64>) -> ShortUrl {
        let now = Utc::now();
        ShortUrl {
            id: 1,
            slug: "abc".to_string(),
            destination: "https://example.com/".to_string(),
            title: None,
            clicks: 0,
            is_active,
            expires_at: expires_in.map(|s| now + ChronoDuration::seconds(s)),
            og_title: None,
            og_description: None,
            og_image: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_decide() {
        let now = Utc::now();
        assert_eq!(decide(None, Some(BROWSER), now, 5), Decision::NotFound);
        assert_eq!(decide(Some(link(false, None)), Some(CRAWLER), now, 5), Decision::NotFound);
        assert_eq!(decide(Some(link(true, Some(-1))), Some(BROWSER), now, 5), Decision::NotFound);
        assert!(matches!(decide(Some(link(true, None)), Some(CRAWLER), now, 5), Decision::Bot(_)));
        assert!(matches!(
            decide(Some(link(true, Some(3600))), None, now, 3),
            Decision::Countdown { seconds: 3, .. }
        ));
    }

    proptest! {
        #[test]
        fn unfollowable_links_are_never_served(
            active in any::<bool>(),
            expires_in in proptest::option::of(-3600i64..3600),
            bot in any::<bool>(),
        ) {
            let now = Utc::now();
            let candidate = link(active, expires_in);
            let followable = candidate.is_followable_at(now);
            let ua = if bot { CRAWLER } else { BROWSER };
            let decision = decide(Some(candidate), Some(ua), now, 5);
            prop_assert_eq!(decision == Decision::NotFound, !followable);
        }

        #[test]
        fn crawlers_never_get_the_countdown(
            name in "(Googlebot|Twitterbot|LinkedInBot|Slackbot|Discordbot|WhatsApp)",
            version in "[0-9]\\.[0-9]",
            seconds in 0u32..60,
        ) {
            let ua = format!("Mozilla/5.0 (compatible; {}/{})", name, version);
            let decision = decide(Some(link(true, None)), Some(&ua), Utc::now(), seconds);
            prop_assert!(matches!(decision, Decision::Bot(_)));
        }
    }

    /// Delegates to a real repository but stalls slug lookups
    struct StallingRepo {
        inner: Arc<dyn ShortUrlRepository>,
        delay: Duration,
    }

    #[async_trait]
    impl ShortUrlRepository for StallingRepo {
        async fn create(&self, short_url: &ShortUrl) -> anyhow::Result<ShortUrl> {
            self.inner.create(short_url).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<ShortUrl>> {
            self.inner.get_by_id(id).await
        }
        async fn get_by_slug(&self, slug: &str) -> anyhow::Result<Option<ShortUrl>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_by_slug(slug).await
        }
        async fn list(&self, params: &ListParams) -> anyhow::Result<(Vec<ShortUrl>, i64)> {
            self.inner.list(params).await
        }
        async fn update(&self, short_url: &ShortUrl) -> anyhow::Result<ShortUrl> {
            self.inner.update(short_url).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
        async fn exists_by_slug(&self, slug: &str) -> anyhow::Result<bool> {
            self.inner.exists_by_slug(slug).await
        }
        async fn increment_clicks(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.increment_clicks(id).await
        }
        async fn set_og(&self, id: i64, og: &OgMetadata) -> anyhow::Result<()> {
            self.inner.set_og(id, og).await
        }
    }

    async fn setup(delay: Option<Duration>) -> (RedirectService, Arc<ShortUrlService>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let mut repo = SqlxShortUrlRepository::boxed(pool);
        if let Some(delay) = delay {
            repo = Arc::new(StallingRepo { inner: repo, delay });
        }
        let links = Arc::new(ShortUrlService::new(repo, Arc::new(MemoryCache::new())));

        let mut config = RedirectConfig::default();
        config.countdown_seconds = 4;
        config.ultra_fast_timeout_ms = 50;
        config.fallback_url = "https://fallback.example/".to_string();
        config
            .static_redirects
            .insert("cv".to_string(), "https://example.com/cv.pdf".to_string());

        let service = RedirectService::new(
            links.clone(),
            Arc::new(PageRenderer::new().unwrap()),
            config,
            SiteConfig::default(),
            "http://localhost:8080/",
        );
        (service, links)
    }

    async fn create(links: &ShortUrlService, slug: &str) -> ShortUrl {
        links
            .create(
                CreateShortUrlInput {
                    destination: "https://example.com/page".to_string(),
                    slug: Some(slug.to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
    }

    async fn clicks_eventually(links: &ShortUrlService, id: i64, expected: i64) -> bool {
        for _ in 0..50 {
            if links.get(id).await.unwrap().clicks == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_bot_gets_preview_and_synchronous_click() {
        let (service, links) = setup(None).await;
        let created = create(&links, "docs").await;

        let reply = service.short_link("docs", Some(CRAWLER)).await;
        let Reply::Page(html) = reply else { panic!("expected page, got {:?}", reply) };
        assert!(html.contains("og:title"));
        assert!(html.contains("http:&#x2F;&#x2F;localhost:8080&#x2F;s&#x2F;docs"));
        assert!(!html.contains(r#"id="count""#));
        assert_eq!(links.get(created.id).await.unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn test_human_gets_countdown_and_click_is_counted() {
        let (service, links) = setup(None).await;
        let created = create(&links, "docs").await;

        let reply = service.short_link("docs", Some(BROWSER)).await;
        let Reply::Page(html) = reply else { panic!("expected page, got {:?}", reply) };
        assert!(html.contains("var left = 4;"));
        assert!(clicks_eventually(&links, created.id, 1).await);
    }

    #[tokio::test]
    async fn test_missing_inactive_and_expired_are_404() {
        let (service, links) = setup(None).await;
        let created = create(&links, "off").await;
        links
            .update(created.id, UpdateShortUrlInput { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(service.short_link("off", Some(BROWSER)).await, Reply::NotFound(_)));
        assert!(matches!(service.short_link("nope", Some(CRAWLER)).await, Reply::NotFound(_)));
        assert!(matches!(service.follow(Strategy::Direct, "off").await, Reply::NotFound(_)));
        assert_eq!(links.get(created.id).await.unwrap().clicks, 0);
    }

    #[tokio::test]
    async fn test_strategies() {
        let (service, links) = setup(None).await;
        let created = create(&links, "docs").await;
        let target = Reply::Location("https://example.com/page".to_string());

        assert_eq!(service.follow(Strategy::Direct, "docs").await, target);
        assert_eq!(service.follow(Strategy::UltraFast, "docs").await, target);
        assert_eq!(service.follow(Strategy::Edge, "docs").await, target);
        assert_eq!(service.follow(Strategy::Edge, "docs").await, target);
        let Reply::Page(html) = service.follow(Strategy::Fast, "docs").await else {
            panic!("fast strategy should render a page")
        };
        assert!(html.contains("http-equiv=\"refresh\""));
        assert!(clicks_eventually(&links, created.id, 5).await);
    }

    #[tokio::test]
    async fn test_static_map_only_for_ultra_fast_and_edge() {
        let (service, _) = setup(None).await;
        let cv = Reply::Location("https://example.com/cv.pdf".to_string());
        assert_eq!(service.follow(Strategy::UltraFast, "cv").await, cv);
        assert_eq!(service.follow(Strategy::Edge, "cv").await, cv);
        assert!(matches!(service.follow(Strategy::Direct, "cv").await, Reply::NotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let (service, links) = setup(Some(Duration::from_millis(300))).await;
        create(&links, "slow").await;
        assert_eq!(
            service.follow(Strategy::UltraFast, "slow").await,
            Reply::Location("https://fallback.example/".to_string())
        );
        assert_eq!(
            service.follow(Strategy::Direct, "slow").await,
            Reply::Location("https://example.com/page".to_string())
        );
    }
}
