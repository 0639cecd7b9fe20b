//! Database repositories
//!
//! One repository per entity. Each exposes an async trait plus an sqlx
//! implementation that serves both SQLite and MySQL.

pub mod blog;
pub mod comment;
pub mod content_meta;
pub mod gallery;
pub mod project;
pub mod short_url;
pub mod tag;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use content_meta::{ContentMetaRepository, SqlxContentMetaRepository};
pub use gallery::{GalleryRepository, SqlxGalleryRepository};
pub use project::{ProjectRepository, SqlxProjectRepository};
pub use short_url::{ShortUrlRepository, SqlxShortUrlRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
