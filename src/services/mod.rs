//! Services layer - business logic
//!
//! Services validate input, coordinate repositories and the cache, and
//! report failures through one `thiserror` enum each.

pub mod blog;
pub mod bot;
pub mod click;
pub mod comment;
pub mod content_meta;
pub mod feed;
pub mod gallery;
pub mod jwt;
pub mod og;
pub mod password;
pub mod project;
pub mod rate_limiter;
pub mod redirect;
pub mod short_url;
pub mod slug;
pub mod tag;
pub mod user;

pub use blog::{BlogService, BlogServiceError, BlogView};
pub use bot::is_bot;
pub use click::ClickTracker;
pub use comment::{CommentService, CommentServiceError};
pub use content_meta::ContentMetaService;
pub use feed::FeedService;
pub use gallery::{GalleryService, GalleryServiceError};
pub use jwt::{Claims, JwtService};
pub use og::{parse_og, OgFetcher};
pub use password::{hash_password, verify_password};
pub use project::{ProjectService, ProjectServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use redirect::{decide, Decision, RedirectService, Reply, Strategy};
pub use short_url::{Lookup, ShortUrlService, ShortUrlServiceError};
pub use slug::generate_slug;
pub use tag::{TagService, TagServiceError};
pub use user::{AuthSession, LoginInput, RegisterInput, UserService, UserServiceError};
