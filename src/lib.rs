//! Inkpress - A lightweight blog CMS with built-in SEO analysis
//!
//! Articles, categories, tags, comments and media are stored through sqlx
//! (SQLite or MySQL), served as a JSON API under `/api/v1` and rendered as
//! HTML pages with Tera templates. Every article is scored by a pure SEO
//! analyzer, and the site publishes a sitemap, robots.txt and an RSS feed.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
