//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories,
//! coordinate caching and validate input. `seo` and `markdown` are pure
//! helpers with no database access.

pub mod article;
pub mod category;
pub mod comment;
pub mod markdown;
pub mod media;
pub mod seo;
pub mod settings;
pub mod sitemap;
pub mod slug;
pub mod tag;

pub use article::{ArticleInput, ArticlePatch, ArticleQuery, ArticleService, ArticleServiceError};
pub use category::{CategoryInput, CategoryPatch, CategoryService, CategoryServiceError};
pub use comment::{CommentInput, CommentService, CommentServiceError};
pub use markdown::{MarkdownRenderer, TocEntry};
pub use media::{MediaService, MediaServiceError};
pub use seo::{analyze, Grade, SeoInput, SeoReport};
pub use settings::{SettingsService, SettingsServiceError, SiteSettings};
pub use sitemap::SitemapService;
pub use tag::{TagService, TagServiceError};
