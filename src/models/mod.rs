//! Data models
//!
//! Database entities (Article, Category, Tag, Media, Comment) and the input,
//! filter and pagination types passed between services and repositories.

mod article;
mod category;
mod comment;
mod media;
mod serde_ext;
mod tag;

pub use article::{
    Article, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams, PagedResult, SeoMeta,
    UpdateArticleInput,
};
pub use category::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentStatus, CommentTree, CreateCommentInput};
pub use media::{CreateMediaInput, Media};
pub use serde_ext::double_option;
pub use tag::{Tag, TagWithCount};
