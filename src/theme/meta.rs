//! SEO head metadata for rendered pages

use serde::Serialize;

use crate::models::{Article, Tag};
use crate::services::sitemap::absolute_url;
use crate::services::SiteSettings;

/// Values for `<title>`, description, canonical and Open Graph tags.
///
/// Templates read this as `meta` and emit the tags verbatim (Tera escapes
/// them), so every field is already resolved to its final value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub keywords: Option<String>,
    pub canonical: String,
    pub og_type: &'static str,
    pub og_title: String,
    pub og_description: String,
    pub og_url: String,
    pub og_image: Option<String>,
    pub noindex: bool,
}

impl PageMeta {
    /// Metadata for the home page and other site-level pages
    pub fn site(site: &SiteSettings, base_url: &str, path: &str) -> Self {
        let url = absolute_url(base_url, path);
        Self {
            title: site.site_name.clone(),
            description: site.site_description.clone(),
            keywords: None,
            canonical: url.clone(),
            og_type: "website",
            og_title: site.site_name.clone(),
            og_description: site.site_description.clone(),
            og_url: url,
            og_image: None,
            noindex: false,
        }
    }

    /// Metadata for a listing such as a category or tag archive
    pub fn listing(
        name: &str,
        description: Option<&str>,
        site: &SiteSettings,
        base_url: &str,
        path: &str,
    ) -> Self {
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&site.site_description)
            .to_string();
        let url = absolute_url(base_url, path);
        Self {
            title: with_site_name(name, site),
            description: description.clone(),
            keywords: None,
            canonical: url.clone(),
            og_type: "website",
            og_title: name.to_string(),
            og_description: description,
            og_url: url,
            og_image: None,
            noindex: false,
        }
    }

    /// Metadata for an article page
    ///
    /// An explicit meta title is used as-is; otherwise the article title is
    /// suffixed with the site name. Keywords fall back to the tag names.
    pub fn article(article: &Article, tags: &[Tag], site: &SiteSettings, base_url: &str) -> Self {
        let title = match non_blank(article.seo.meta_title.as_deref()) {
            Some(meta_title) => meta_title.to_string(),
            None => with_site_name(&article.title, site),
        };
        let description = article
            .display_description()
            .unwrap_or(&site.site_description)
            .to_string();
        let keywords = non_blank(article.seo.meta_keywords.as_deref())
            .map(str::to_string)
            .or_else(|| {
                (!tags.is_empty()).then(|| {
                    tags.iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
            });
        let url = absolute_url(base_url, &article.path());
        let canonical = non_blank(article.seo.canonical_url.as_deref())
            .map(|c| absolute_url(base_url, c))
            .unwrap_or_else(|| url.clone());
        let og_image = non_blank(article.seo.og_image.as_deref())
            .or_else(|| non_blank(article.featured_image.as_deref()))
            .map(|image| absolute_url(base_url, image));

        Self {
            title,
            description: description.clone(),
            keywords,
            canonical,
            og_type: "article",
            og_title: article.display_title().to_string(),
            og_description: description,
            og_url: url,
            og_image,
            noindex: article.seo.noindex,
        }
    }

    /// Metadata for error pages, which are never indexed
    pub fn error(title: &str, site: &SiteSettings, base_url: &str, path: &str) -> Self {
        Self {
            noindex: true,
            ..Self::listing(title, None, site, base_url, path)
        }
    }
}

fn with_site_name(title: &str, site: &SiteSettings) -> String {
    if site.site_name.trim().is_empty() {
        title.to_string()
    } else {
        format!("{} | {}", title, site.site_name)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleStatus, SeoMeta};
    use chrono::Utc;

    fn site() -> SiteSettings {
        SiteSettings {
            site_name: "Field Notes".to_string(),
            site_description: "Notes from the field".to_string(),
            ..SiteSettings::default()
        }
    }

    fn article() -> Article {
        Article {
            id: 1,
            slug: "rust-caching".to_string(),
            title: "Caching in Rust".to_string(),
            excerpt: None,
            content: "Body".to_string(),
            content_html: "<p>Body</p>".to_string(),
            category_id: None,
            status: ArticleStatus::Published,
            featured_image: None,
            seo: SeoMeta::default(),
            seo_score: 0,
            view_count: 0,
            published_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            id: 1,
            slug: name.to_lowercase(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_article_defaults() {
        let meta = PageMeta::article(&article(), &[], &site(), "https://example.com/");
        assert_eq!(meta.title, "Caching in Rust | Field Notes");
        assert_eq!(meta.description, "Notes from the field");
        assert_eq!(meta.canonical, "https://example.com/posts/rust-caching");
        assert_eq!(meta.og_url, meta.canonical);
        assert_eq!(meta.og_type, "article");
        assert_eq!(meta.keywords, None);
        assert_eq!(meta.og_image, None);
        assert!(!meta.noindex);
    }

    #[test]
    fn test_article_seo_overrides() {
        let mut article = article();
        article.excerpt = Some("A short excerpt".to_string());
        article.featured_image = Some("/uploads/cover.png".to_string());
        article.seo = SeoMeta {
            meta_title: Some("Custom Title".to_string()),
            canonical_url: Some("https://other.example/original".to_string()),
            noindex: true,
            ..SeoMeta::default()
        };

        let meta = PageMeta::article(
            &article,
            &[tag("Rust"), tag("Cache")],
            &site(),
            "https://example.com",
        );
        assert_eq!(meta.title, "Custom Title");
        assert_eq!(meta.og_title, "Custom Title");
        assert_eq!(meta.description, "A short excerpt");
        assert_eq!(meta.keywords.as_deref(), Some("Rust, Cache"));
        assert_eq!(meta.canonical, "https://other.example/original");
        assert_eq!(meta.og_url, "https://example.com/posts/rust-caching");
        assert_eq!(
            meta.og_image.as_deref(),
            Some("https://example.com/uploads/cover.png")
        );
        assert!(meta.noindex);
    }

    #[test]
    fn test_meta_description_wins_over_excerpt() {
        let mut article = article();
        article.excerpt = Some("Excerpt".to_string());
        article.seo.meta_description = Some("Meta description".to_string());
        article.seo.meta_keywords = Some("explicit, keywords".to_string());
        let meta = PageMeta::article(&article, &[tag("Rust")], &site(), "https://example.com");
        assert_eq!(meta.description, "Meta description");
        assert_eq!(meta.keywords.as_deref(), Some("explicit, keywords"));
    }

    #[test]
    fn test_listing_and_error() {
        let meta = PageMeta::listing("Rust", None, &site(), "https://example.com", "/tags/rust");
        assert_eq!(meta.title, "Rust | Field Notes");
        assert_eq!(meta.description, "Notes from the field");
        assert_eq!(meta.canonical, "https://example.com/tags/rust");

        let meta = PageMeta::error("Page not found", &site(), "https://example.com", "/nope");
        assert!(meta.noindex);
    }

    #[test]
    fn test_non_ascii_slug_is_percent_encoded() {
        let mut article = article();
        article.slug = "café-crème".to_string();
        let meta = PageMeta::article(&article, &[], &site(), "https://example.com");
        assert_eq!(meta.canonical, "https://example.com/posts/caf%C3%A9-cr%C3%A8me");
        assert_eq!(meta.og_url, meta.canonical);
    }
}
