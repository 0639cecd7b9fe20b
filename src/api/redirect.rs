//! Short-link redirect routes
//!
//! - GET /s/{slug} - Preview page for crawlers, countdown for people
//! - GET /api/direct/{slug}, /api/fast/{slug}, /api/ultra-fast/{slug},
//!   /api/edge/{slug} - Alternate handlers, see [`Strategy`]

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::api::middleware::AppState;
use crate::services::{Reply, Strategy};

/// Edge answers may be kept by a CDN for a short while
const EDGE_CACHE_CONTROL: &str = "public, max-age=60, s-maxage=300";

fn reply_response(reply: Reply) -> Response {
    let mut response = match reply {
        Reply::Page(html) => Html(html).into_response(),
        Reply::Location(url) => Redirect::temporary(&url).into_response(),
        Reply::NotFound(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Reply::Error(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// GET /s/{slug}
pub async fn short_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok());
    reply_response(state.redirect_service.short_link(&slug, user_agent).await)
}

async fn follow(state: &AppState, strategy: Strategy, slug: &str) -> Response {
    let reply = state.redirect_service.follow(strategy, slug).await;
    let cacheable = strategy == Strategy::Edge && matches!(reply, Reply::Location(_));
    let mut response = reply_response(reply);
    if cacheable {
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(EDGE_CACHE_CONTROL));
        headers.insert("cdn-cache-control", HeaderValue::from_static(EDGE_CACHE_CONTROL));
    }
    response
}

/// GET /api/direct/{slug}
pub async fn direct(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    follow(&state, Strategy::Direct, &slug).await
}

/// GET /api/fast/{slug}
pub async fn fast(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    follow(&state, Strategy::Fast, &slug).await
}

/// GET /api/ultra-fast/{slug}
pub async fn ultra_fast(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    follow(&state, Strategy::UltraFast, &slug).await
}

/// GET /api/edge/{slug}
pub async fn edge(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    follow(&state, Strategy::Edge, &slug).await
}
