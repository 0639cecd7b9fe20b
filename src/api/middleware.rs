//! API middleware
//!
//! Shared state, the JSON error type and the bearer-token guards.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCommentRepository, SqlxContentMetaRepository, SqlxGalleryRepository,
    SqlxProjectRepository, SqlxShortUrlRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::UserRole;
use crate::render::PageRenderer;
use crate::services::{
    BlogService, BlogServiceError, Claims, CommentService, CommentServiceError,
    ContentMetaService, FeedService, GalleryService, GalleryServiceError, JwtService,
    LoginRateLimiter, OgFetcher, ProjectService, ProjectServiceError, RedirectService,
    ShortUrlService, ShortUrlServiceError, TagService, TagServiceError, UserService,
    UserServiceError,
};

/// Name of the cookie carrying the access token
pub const TOKEN_COOKIE: &str = "token";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub user_service: Arc<UserService>,
    pub blog_service: Arc<BlogService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub project_service: Arc<ProjectService>,
    pub gallery_service: Arc<GalleryService>,
    pub view_service: Arc<ContentMetaService>,
    pub short_url_service: Arc<ShortUrlService>,
    pub og_fetcher: Arc<OgFetcher>,
    pub redirect_service: Arc<RedirectService>,
    pub feed_service: Arc<FeedService>,
}

impl AppState {
    /// Wire repositories, cache and services over an open, migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let pages = Arc::new(PageRenderer::new()?);
        let base_url = config.server.base_url.clone();

        let jwt = Arc::new(JwtService::from_config(&config.auth));
        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            jwt.clone(),
            config.auth.allow_registration,
        ));

        let blog_repo = SqlxBlogRepository::boxed(pool.clone());
        let tag_service = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let blog_service = Arc::new(BlogService::new(
            blog_repo.clone(),
            tag_service.clone(),
            cache.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            blog_repo,
        ));
        let project_service = Arc::new(ProjectService::new(
            SqlxProjectRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let gallery_service = Arc::new(GalleryService::new(SqlxGalleryRepository::boxed(pool.clone())));
        let view_service = Arc::new(ContentMetaService::new(SqlxContentMetaRepository::boxed(
            pool.clone(),
        )));

        let og_fetcher = Arc::new(OgFetcher::new(
            cache.clone(),
            Duration::from_millis(config.redirect.og_timeout_ms.max(1)),
        )?);
        let short_url_service = Arc::new(
            ShortUrlService::new(SqlxShortUrlRepository::boxed(pool.clone()), cache)
                .with_og(og_fetcher.clone()),
        );
        let redirect_service = Arc::new(RedirectService::new(
            short_url_service.clone(),
            pages.clone(),
            config.redirect.clone(),
            config.site.clone(),
            base_url.clone(),
        ));
        let feed_service = Arc::new(FeedService::new(
            blog_service.clone(),
            pages,
            config.site.clone(),
            base_url,
        ));

        Ok(Self {
            pool,
            config: Arc::new(config),
            jwt,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            user_service,
            blog_service,
            tag_service,
            comment_service,
            project_service,
            gallery_service,
            view_service,
            short_url_service,
            og_fetcher,
            redirect_service,
            feed_service,
        })
    }
}

/// Token claims of the caller, set by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new("METHOD_NOT_ALLOWED", "Method not allowed")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal_error("Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "METHOD_NOT_ALLOWED" => StatusCode::METHOD_NOT_ALLOWED,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidCredentials => {
                ApiError::unauthorized("Invalid username or password")
            }
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::RegistrationClosed => {
                ApiError::forbidden("Registration is closed")
            }
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(err: BlogServiceError) -> Self {
        match err {
            BlogServiceError::NotFound(what) => ApiError::not_found(format!("Blog not found: {}", what)),
            BlogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BlogServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Slug already in use: {}", slug))
            }
            BlogServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(what) => ApiError::not_found(format!("Tag not found: {}", what)),
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::DuplicateTag(name) => {
                ApiError::conflict(format!("Tag already exists: {}", name))
            }
            TagServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ProjectServiceError> for ApiError {
    fn from(err: ProjectServiceError) -> Self {
        match err {
            ProjectServiceError::NotFound(what) => {
                ApiError::not_found(format!("Project not found: {}", what))
            }
            ProjectServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProjectServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Slug already in use: {}", slug))
            }
            ProjectServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<GalleryServiceError> for ApiError {
    fn from(err: GalleryServiceError) -> Self {
        match err {
            GalleryServiceError::NotFound(id) => {
                ApiError::not_found(format!("Gallery item not found: {}", id))
            }
            GalleryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            GalleryServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ShortUrlServiceError> for ApiError {
    fn from(err: ShortUrlServiceError) -> Self {
        match err {
            ShortUrlServiceError::NotFound(what) => {
                ApiError::not_found(format!("Short URL not found: {}", what))
            }
            ShortUrlServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ShortUrlServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Slug already in use: {}", slug))
            }
            ShortUrlServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Bearer header first, then the `token` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Client address for throttling
///
/// Proxy headers are client-controlled, so they are only read when
/// `trust_proxy` is set; otherwise the socket peer address is used.
pub fn extract_ip_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if !trust_proxy {
        return peer;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .or(real_ip)
        .and_then(|ip| ip.trim().parse().ok())
        .or(peer)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state.jwt.validate(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// JSON body for routes that do not exist
pub async fn not_found_fallback() -> ApiError {
    ApiError::not_found("Route not found")
}

/// JSON body for known routes hit with the wrong method
pub async fn method_not_allowed_fallback() -> ApiError {
    ApiError::method_not_allowed()
}
