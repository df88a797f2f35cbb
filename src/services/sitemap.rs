//! Sitemap, RSS feed and robots.txt
//!
//! Documents are generated from published content and cached until the next
//! content mutation calls [`invalidate_feeds`].

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ArticleRepository, CategoryRepository, TagRepository};
use crate::models::{Article, ArticleFilter};
use crate::services::markdown::summarize;
use crate::services::settings::SettingsService;
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::borrow::Cow;
use std::sync::Arc;

/// Upper bound of URLs in a single sitemap file
const MAX_SITEMAP_ARTICLES: i64 = 50_000;
/// Items in the RSS feed
pub const FEED_ITEM_COUNT: i64 = 20;
const FEED_SUMMARY_CHARS: usize = 300;

const CACHE_KEY_SITEMAP: &str = "sitemap:xml";
const CACHE_KEY_FEED: &str = "feed:rss";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Drop cached sitemap and feed documents
pub async fn invalidate_feeds(cache: &Cache) {
    let _ = cache.delete_pattern("sitemap:*").await;
    let _ = cache.delete_pattern("feed:*").await;
}

pub struct SitemapService {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    settings: Arc<SettingsService>,
    cache: Arc<Cache>,
    default_base_url: String,
}

impl SitemapService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        settings: Arc<SettingsService>,
        cache: Arc<Cache>,
        default_base_url: impl Into<String>,
    ) -> Self {
        Self {
            articles,
            categories,
            tags,
            settings,
            cache,
            default_base_url: default_base_url.into(),
        }
    }

    /// Absolute site URL without a trailing slash: the `site_url` setting
    /// when set, otherwise the configured default
    pub async fn base_url(&self) -> Result<String> {
        let site = self
            .settings
            .get_site_settings()
            .await
            .context("Failed to load site settings")?;
        let url = if site.site_url.trim().is_empty() {
            self.default_base_url.as_str()
        } else {
            site.site_url.trim()
        };
        Ok(url.trim_end_matches('/').to_string())
    }

    /// sitemaps.org 0.9 `urlset` of every public page
    pub async fn sitemap_xml(&self) -> Result<String> {
        if let Ok(Some(cached)) = self.cache.get::<String>(CACHE_KEY_SITEMAP).await {
            return Ok(cached);
        }

        let base = self.base_url().await?;
        let articles = self
            .articles
            .list(&ArticleFilter::published(), 0, MAX_SITEMAP_ARTICLES)
            .await
            .context("Failed to list articles for sitemap")?;
        let categories = self
            .categories
            .list()
            .await
            .context("Failed to list categories for sitemap")?;
        let tags = self
            .tags
            .list_with_counts(true)
            .await
            .context("Failed to list tags for sitemap")?;

        let mut urlset = UrlSet::new()?;
        urlset.push(&absolute_url(&base, "/"), None, "daily", "1.0")?;
        for article in articles.iter().filter(|a| !a.seo.noindex) {
            let lastmod = article.updated_at.format("%Y-%m-%d").to_string();
            urlset.push(
                &absolute_url(&base, &article.path()),
                Some(&lastmod),
                "weekly",
                "0.8",
            )?;
        }
        for category in &categories {
            urlset.push(&absolute_url(&base, &category.path()), None, "weekly", "0.5")?;
        }
        for tag in tags.iter().filter(|t| t.article_count > 0) {
            urlset.push(&absolute_url(&base, &tag.tag.path()), None, "weekly", "0.3")?;
        }
        let xml = urlset.finish()?;

        let _ = self
            .cache
            .set(CACHE_KEY_SITEMAP, &xml, self.cache.default_ttl())
            .await;
        Ok(xml)
    }

    /// RSS 2.0 channel of the newest published articles
    pub async fn rss_feed(&self) -> Result<String> {
        if let Ok(Some(cached)) = self.cache.get::<String>(CACHE_KEY_FEED).await {
            return Ok(cached);
        }

        let base = self.base_url().await?;
        let site = self
            .settings
            .get_site_settings()
            .await
            .context("Failed to load site settings")?;
        let articles = self
            .articles
            .list(&ArticleFilter::published(), 0, FEED_ITEM_COUNT)
            .await
            .context("Failed to list articles for feed")?;

        let channel = ChannelBuilder::default()
            .title(site.site_name)
            .link(absolute_url(&base, "/"))
            .description(site.site_description)
            .last_build_date(
                articles
                    .iter()
                    .map(|a| a.updated_at)
                    .max()
                    .map(|latest| latest.to_rfc2822()),
            )
            .items(articles.iter().map(|a| feed_item(&base, a)).collect::<Vec<_>>())
            .build();
        let xml = channel.to_string();

        let _ = self
            .cache
            .set(CACHE_KEY_FEED, &xml, self.cache.default_ttl())
            .await;
        Ok(xml)
    }

    /// Allow everything and point crawlers at the sitemap
    pub async fn robots_txt(&self) -> Result<String> {
        let base = self.base_url().await?;
        Ok(format!(
            "User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n",
            base
        ))
    }
}

/// Join a site-relative path onto the base URL, percent-encoding each path
/// segment. Absolute URLs pass through unchanged.
pub fn absolute_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let (path, suffix) = match path.find(|c| c == '?' || c == '#') {
        Some(i) => path.split_at(i),
        None => (path, ""),
    };
    let encoded = path
        .trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}{}", base_url.trim_end_matches('/'), encoded, suffix)
}

/// Already-encoded segments are decoded first so they are not encoded twice
fn encode_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));
    urlencoding::encode(&decoded).into_owned()
}

/// Streaming writer for a sitemaps.org `urlset`
struct UrlSet {
    writer: Writer<Vec<u8>>,
}

impl UrlSet {
    fn new() -> Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(
            BytesStart::new("urlset").with_attributes([("xmlns", SITEMAP_NS)]),
        ))?;
        Ok(Self { writer })
    }

    fn push(
        &mut self,
        loc: &str,
        lastmod: Option<&str>,
        changefreq: &str,
        priority: &str,
    ) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new("url")))?;
        self.text_element("loc", loc)?;
        if let Some(lastmod) = lastmod {
            self.text_element("lastmod", lastmod)?;
        }
        self.text_element("changefreq", changefreq)?;
        self.text_element("priority", priority)?;
        self.writer.write_event(Event::End(BytesEnd::new("url")))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn finish(mut self) -> Result<String> {
        self.writer
            .write_event(Event::End(BytesEnd::new("urlset")))?;
        let mut xml = String::from_utf8(self.writer.into_inner())
            .context("Sitemap is not valid UTF-8")?;
        xml.push('\n');
        Ok(xml)
    }
}

fn feed_item(base: &str, article: &Article) -> Item {
    let link = absolute_url(base, &article.path());
    let description = article
        .display_description()
        .map(str::to_string)
        .unwrap_or_else(|| summarize(&article.content, FEED_SUMMARY_CHARS));
    let published = article.published_at.unwrap_or(article.created_at);

    ItemBuilder::default()
        .title(Some(article.title.clone()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().value(link).permalink(true).build()))
        .pub_date(Some(published.to_rfc2822()))
        .description(Some(description))
        .build()
}
