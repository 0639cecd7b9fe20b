//! API layer - HTTP handlers and routing
//!
//! - JSON API under `/api/v1` (blogs, comments, tags, projects, gallery,
//!   short URLs, view counters, auth)
//! - Short-link redirects at `/s/{slug}` and the alternate handlers under
//!   `/api/{direct,fast,ultra-fast,edge}/{slug}`
//! - RSS feed at `/feed.xml`

pub mod auth;
pub mod blogs;
pub mod comments;
pub mod common;
pub mod gallery;
pub mod middleware;
pub mod projects;
pub mod redirect;
pub mod short_urls;
pub mod site;
pub mod tags;
pub mod views;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
///
/// Public and admin handlers share paths, so path parameters keep one name
/// per position; write routes parse the `{slug}` segment as a numeric id.
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .route("/admin/blogs", get(blogs::list_all_blogs))
        .route("/blogs", post(blogs::create_blog))
        .route("/blogs/{slug}", put(blogs::update_blog).delete(blogs::delete_blog))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/tags", post(tags::create_tag))
        .route("/tags/{slug}", delete(tags::delete_tag))
        .route("/projects", post(projects::create_project))
        .route(
            "/projects/{slug}",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route("/gallery", post(gallery::create_item))
        .route("/gallery/{id}", put(gallery::update_item).delete(gallery::delete_item))
        .route(
            "/short-urls",
            get(short_urls::list_short_urls).post(short_urls::create_short_url),
        )
        .route(
            "/short-urls/{id}",
            get(short_urls::get_short_url)
                .put(short_urls::update_short_url)
                .delete(short_urls::delete_short_url),
        )
        .route("/og", get(short_urls::preview_og))
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/health", get(site::health))
        .route("/site/info", get(site::site_info))
        .nest("/auth", auth::public_router())
        .route("/blogs", get(blogs::list_blogs))
        .route("/blogs/{slug}", get(blogs::get_blog))
        .route(
            "/blogs/{slug}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/tags", get(tags::list_tags))
        .route("/tags/{slug}/blogs", get(tags::list_tag_blogs))
        .route("/projects", get(projects::list_projects))
        .route("/projects/{slug}", get(projects::get_project))
        .route("/gallery", get(gallery::list_items))
        .route("/gallery/categories", get(gallery::list_categories))
        .route("/gallery/{id}", get(gallery::get_item))
        .route("/views", get(views::most_viewed))
        .route("/views/{*slug}", get(views::get_views).post(views::record_view))
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors_origin = state.config.server.cors_origin.clone();
    let cors = match cors_origin.parse::<HeaderValue>() {
        // Credentials need an explicit origin for cookie auth
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!("Ignoring invalid server.cors_origin '{}'", cors_origin);
            CorsLayer::new()
        }
    };

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/s/{slug}", get(redirect::short_link))
        .route("/api/direct/{slug}", get(redirect::direct))
        .route("/api/fast/{slug}", get(redirect::fast))
        .route("/api/ultra-fast/{slug}", get(redirect::ultra_fast))
        .route("/api/edge/{slug}", get(redirect::edge))
        .route("/feed.xml", get(site::rss_feed))
        .fallback(middleware::not_found_fallback)
        .method_not_allowed_fallback(middleware::method_not_allowed_fallback)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
