//! Data models
//!
//! Database entities, their create/update inputs and the pagination types
//! shared by list queries.

mod blog;
mod comment;
mod content_meta;
mod gallery;
mod pagination;
mod project;
mod short_url;
mod tag;
mod user;

pub use blog::{Blog, BlogFilter, BlogStatus, CreateBlogInput, UpdateBlogInput};
pub use comment::{gravatar_url, Comment, CommentThread, CreateCommentInput};
pub use content_meta::ContentMeta;
pub use gallery::{CreateGalleryItemInput, GalleryItem, UpdateGalleryItemInput};
pub use pagination::{ListParams, PagedResult};
pub use project::{CreateProjectInput, Project, UpdateProjectInput};
pub use short_url::{CreateShortUrlInput, LinkState, OgMetadata, ShortUrl, UpdateShortUrlInput};
pub use tag::{Tag, TagWithCount};
pub use user::{User, UserRole};
