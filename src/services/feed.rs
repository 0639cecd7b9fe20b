//! RSS 2.0 feed of recent posts

use crate::config::SiteConfig;
use crate::render::PageRenderer;
use crate::services::blog::{BlogService, BlogServiceError};
use serde::Serialize;
use std::sync::Arc;

pub const FEED_SIZE: u32 = 20;

#[derive(Debug, Serialize)]
struct FeedItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FeedContext<'a> {
    site_title: &'a str,
    site_description: &'a str,
    base_url: &'a str,
    last_build: Option<String>,
    items: Vec<FeedItem>,
}

pub struct FeedService {
    blogs: Arc<BlogService>,
    pages: Arc<PageRenderer>,
    site: SiteConfig,
    base_url: String,
}

impl FeedService {
    pub fn new(
        blogs: Arc<BlogService>,
        pages: Arc<PageRenderer>,
        site: SiteConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            blogs,
            pages,
            site,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The feed document
    pub async fn rss(&self) -> Result<String, BlogServiceError> {
        let posts = self.blogs.latest_published(FEED_SIZE).await?;

        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            let tags = self
                .blogs
                .get_by_id(post.id)
                .await
                .map(|view| view.tags.into_iter().map(|t| t.name).collect())
                .unwrap_or_default();
            items.push(FeedItem {
                link: format!("{}/blog/{}", self.base_url, post.slug),
                description: post.summary(),
                pub_date: post.published_at.unwrap_or(post.created_at).to_rfc2822(),
                title: post.title,
                tags,
            });
        }

        let context = FeedContext {
            site_title: &self.site.title,
            site_description: &self.site.description,
            base_url: &self.base_url,
            last_build: items.first().map(|i| i.pub_date.clone()),
            items,
        };
        Ok(self.pages.render("rss.xml", &context)?)
    }
}
