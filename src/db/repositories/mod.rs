//! Database repositories
//!
//! One repository per entity. Each exposes a trait used by the services and
//! an sqlx implementation that works on both SQLite and MySQL.

pub mod article;
pub mod category;
pub mod comment;
pub mod media;
pub mod settings;
pub mod tag;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use tag::{SqlxTagRepository, TagRepository};
