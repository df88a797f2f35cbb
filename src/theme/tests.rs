//! Tests for the theme engine

use super::*;
use crate::services::SiteSettings;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn base_context() -> TeraContext {
    let site = SiteSettings {
        site_name: "Field Notes".to_string(),
        site_description: "Notes & thoughts".to_string(),
        ..SiteSettings::default()
    };
    let mut context = TeraContext::new();
    context.insert("meta", &PageMeta::site(&site, "https://example.com", "/"));
    context.insert("site", &site);
    context.insert("year", &2026);
    context.insert("categories", &Vec::<serde_json::Value>::new());
    context
}

fn index_context() -> TeraContext {
    let mut context = base_context();
    context.insert(
        "articles",
        &serde_json::json!([{
            "title": "Hello <World>",
            "path": "/posts/hello-world",
            "summary": "First post",
            "published_at": "2026-03-01T10:00:00Z"
        }]),
    );
    context.insert(
        "pagination",
        &serde_json::json!({
            "page": 1, "total_pages": 2, "has_prev": false, "has_next": true, "base_path": "/"
        }),
    );
    context
}

#[test]
fn test_embedded_templates_loaded() {
    let engine = ThemeEngine::embedded().unwrap();
    for name in [
        "base.html",
        "macros.html",
        "index.html",
        "article.html",
        "category.html",
        "tag.html",
        "error.html",
    ] {
        assert!(engine.has_template(name), "missing {}", name);
    }
}

#[test]
fn test_render_index_with_head_tags() {
    let engine = ThemeEngine::embedded().unwrap();
    let html = engine.render("index.html", &index_context()).unwrap();

    assert!(html.contains("<title>Field Notes</title>"));
    assert!(html.contains(r#"<link rel="canonical" href="https://example.com/">"#));
    assert!(html.contains(r#"<meta property="og:type" content="website">"#));
    assert!(html.contains("Notes &amp; thoughts"));
    // Autoescaped
    assert!(html.contains("Hello &lt;World&gt;"));
    assert!(html.contains(r#"href="/?page=2""#));
    assert!(!html.contains("noindex"));
}

#[test]
fn test_render_error_page_noindex() {
    let engine = ThemeEngine::embedded().unwrap();
    let mut context = base_context();
    let site = SiteSettings::default();
    context.insert(
        "meta",
        &PageMeta::error("Page not found", &site, "https://example.com", "/missing"),
    );
    context.insert("status", &404);
    context.insert("error_title", "Page not found");
    context.insert("error_message", "Nothing here");

    let html = engine.render(ERROR_TEMPLATE, &context).unwrap();
    assert!(html.contains(r#"<meta name="robots" content="noindex">"#));
    assert!(html.contains("Nothing here"));
}

#[test]
fn test_override_replaces_embedded_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("index.html"),
        r#"{% extends "base.html" %}{% block content %}<p id="custom">{{ articles | length }} posts</p>{% endblock content %}"#,
    )
    .unwrap();

    let engine = ThemeEngine::new(temp_dir.path()).unwrap();
    let html = engine.render("index.html", &index_context()).unwrap();
    assert!(html.contains(r#"<p id="custom">1 posts</p>"#));
    // Untouched templates still come from the binary
    assert!(engine.has_template("article.html"));
}

#[test]
fn test_missing_override_directory_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(&temp_dir.path().join("does-not-exist")).unwrap();
    assert!(engine.has_template("index.html"));
}

#[test]
fn test_invalid_override_fails_to_load() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.html"), "{% if %}").unwrap();
    assert!(ThemeEngine::new(temp_dir.path()).is_err());
}

#[test]
fn test_reload_picks_up_new_override() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = ThemeEngine::new(temp_dir.path()).unwrap();
    assert!(!engine.has_template("about.html"));

    fs::write(temp_dir.path().join("about.html"), "About {{ site.site_name }}").unwrap();
    engine.reload().unwrap();
    assert_eq!(
        engine.render("about.html", &base_context()).unwrap(),
        "About Field Notes"
    );
}

#[test]
fn test_render_with_fallback_uses_error_template() {
    let engine = ThemeEngine::embedded().unwrap();
    // `article.html` needs an article in context
    let page = engine.render_with_fallback("article.html", &base_context());
    assert!(page.fallback);
    assert!(page.html.contains("Something went wrong"));
    assert!(page.html.contains("Field Notes"));

    let page = engine.render_with_fallback("index.html", &index_context());
    assert!(!page.fallback);
}

#[test]
fn test_render_with_fallback_last_resort() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("error.html"), "{{ missing.value }}").unwrap();
    let engine = ThemeEngine::new(temp_dir.path()).unwrap();

    let page = engine.render_with_fallback("no-such-template.html", &base_context());
    assert!(page.fallback);
    assert!(page.html.starts_with("<!DOCTYPE html>"));
    assert!(page.html.contains("could not be rendered"));
}
