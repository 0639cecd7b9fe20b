//! Server-rendered pages
//!
//! The redirect landing pages and the RSS feed are Tera templates bundled
//! into the binary from `templates/`.

use anyhow::Result;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::config::SiteConfig;
use crate::models::ShortUrl;

mod error;

pub use error::RenderError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
#[include = "*.xml"]
struct BundledTemplates;

pub struct PageRenderer {
    tera: Tera,
}

#[derive(Serialize)]
struct CountdownPage<'a> {
    site_title: &'a str,
    link_title: Option<&'a str>,
    destination: &'a str,
    destination_host: String,
    destination_js: String,
    seconds: u32,
    og_title: Option<&'a str>,
    og_description: Option<&'a str>,
    og_image: Option<&'a str>,
}

#[derive(Serialize)]
struct BotPage<'a> {
    short_url: &'a str,
    destination: &'a str,
    destination_js: String,
    og_title: &'a str,
    og_site_name: &'a str,
    og_description: Option<&'a str>,
    og_image: Option<&'a str>,
}

#[derive(Serialize)]
struct FastPage<'a> {
    destination: &'a str,
    destination_js: String,
}

#[derive(Serialize)]
struct ErrorPage<'a> {
    site_title: &'a str,
    status: u16,
    message: &'a str,
}

impl PageRenderer {
    /// Load every bundled template
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in BundledTemplates::iter() {
            let file = BundledTemplates::get(&name)
                .ok_or_else(|| RenderError::Missing(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| RenderError::Missing(name.to_string()))?;
            templates.push((name.to_string(), content));
        }

        let mut tera = Tera::default();
        // Tera's HTML escaping also rewrites `/`; XML output escapes via the `xml` filter
        tera.autoescape_on(vec![".html"]);
        tera.register_filter("xml", xml_filter);
        tera.add_raw_templates(templates)
            .map_err(|e| RenderError::TemplateError(describe(&e)))?;
        tracing::debug!("Loaded {} page templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        let context = TeraContext::from_serialize(data)
            .map_err(|e| RenderError::TemplateError(describe(&e)))?;
        self.tera.render(template, &context).map_err(|e| {
            RenderError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e)))
                .into()
        })
    }

    /// Human landing page that counts down before following the link
    pub fn countdown(&self, link: &ShortUrl, seconds: u32, site: &SiteConfig) -> Result<String> {
        self.render(
            "countdown.html",
            &CountdownPage {
                site_title: &site.title,
                link_title: link.title.as_deref(),
                destination: &link.destination,
                destination_host: host_of(&link.destination),
                destination_js: js_string(&link.destination)?,
                seconds,
                og_title: link.og_title.as_deref(),
                og_description: link.og_description.as_deref(),
                og_image: link.og_image.as_deref(),
            },
        )
    }

    /// Hidden page carrying the link preview tags for crawlers
    pub fn bot(&self, link: &ShortUrl, short_url: &str, site: &SiteConfig) -> Result<String> {
        let og_title = link
            .og_title
            .as_deref()
            .or(link.title.as_deref())
            .unwrap_or(&site.title);
        self.render(
            "bot.html",
            &BotPage {
                short_url,
                destination: &link.destination,
                destination_js: js_string(&link.destination)?,
                og_title,
                og_site_name: &site.title,
                og_description: link.og_description.as_deref(),
                og_image: link.og_image.as_deref(),
            },
        )
    }

    /// Bare meta-refresh page
    pub fn fast(&self, destination: &str) -> Result<String> {
        self.render(
            "fast.html",
            &FastPage {
                destination,
                destination_js: js_string(destination)?,
            },
        )
    }

    pub fn error_page(&self, status: u16, message: &str, site: &SiteConfig) -> Result<String> {
        self.render(
            "not_found.html",
            &ErrorPage {
                site_title: &site.title,
                status,
                message,
            },
        )
    }
}

/// Escape text for XML element content and attribute values
pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn xml_filter(value: &tera::Value, _: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let text = match value {
        tera::Value::String(s) => xml_escape(s),
        tera::Value::Null => String::new(),
        other => xml_escape(&other.to_string()),
    };
    Ok(tera::Value::String(text))
}

/// JSON string literal that is safe inside a `<script>` element
fn js_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  Caused by: {}", cause));
        source = cause.source();
    }
    message
}
