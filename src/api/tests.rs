use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::net::SocketAddr;
use tower::ServiceExt;

use super::*;
use crate::config::Config;
use crate::db::{create_test_pool, migrations};

const BROWSER: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 Safari/605.1.15";
const CRAWLER: &str = "Twitterbot/1.0";

async fn server_with(config: Config) -> TestServer {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    let state = AppState::new(pool, config).unwrap();
    TestServer::new(build_router(state)).unwrap()
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "test-secret".to_string();
    config.redirect.countdown_seconds = 3;
    config
}

async fn server() -> TestServer {
    server_with(test_config()).await
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn register(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "correct horse battery",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}

async fn create_link(server: &TestServer, token: &str, slug: &str) -> Value {
    let response = server
        .post("/api/v1/short-urls")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({ "destination": "https://docs.example.invalid/guide", "slug": slug }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    response.json::<Value>()
}

async fn clicks(server: &TestServer, token: &str, id: i64) -> i64 {
    server
        .get(&format!("/api/v1/short-urls/{}", id))
        .add_header(header::AUTHORIZATION, bearer(token))
        .await
        .json::<Value>()["clicks"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = server().await;
    let response = server.get("/api/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["database"], "ok");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = server().await;
    let response = server.get("/api/v1/nothing-here").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let server = server().await;
    let response = server.delete("/api/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let server = server().await;
    let token = register(&server, "alice").await;

    let me = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let body = me.json::<Value>();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "admin");
    assert!(body.get("password_hash").is_none());

    let login = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "alice@example.com", "password": "correct horse battery" }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);
    let cookie = login.header(header::SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let by_cookie = server
        .get("/api/v1/auth/me")
        .add_header(header::COOKIE, HeaderValue::from_str(&pair).unwrap())
        .await;
    assert_eq!(by_cookie.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_failures() {
    let server = server().await;
    register(&server, "alice").await;

    let anonymous = server.get("/api/v1/auth/me").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json::<Value>()["error"]["code"], "UNAUTHORIZED");

    let forged = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer("not.a.token"))
        .await;
    assert_eq!(forged.status_code(), StatusCode::UNAUTHORIZED);

    let wrong = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "alice", "password": "wrong password" }))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let closed = server
        .post("/api/v1/auth/register")
        .json(&json!({ "username": "bob", "email": "bob@example.com", "password": "another password" }))
        .await;
    assert_eq!(closed.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_repeated_failures_are_throttled() {
    let server = server().await;
    register(&server, "alice").await;

    for _ in 0..5 {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "login": "alice", "password": "wrong password" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
    let locked = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "ALICE", "password": "correct horse battery" }))
        .await;
    assert_eq!(locked.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(locked.json::<Value>()["error"]["details"]["retry_after"], 900);
}

#[tokio::test]
async fn test_ip_throttle_uses_forwarded_header_behind_proxy() {
    let mut config = test_config();
    config.server.trust_proxy = true;
    let server = server_with(config).await;
    let forwarded = HeaderName::from_static("x-forwarded-for");
    let mut last = StatusCode::OK;
    for i in 0..11 {
        last = server
            .post("/api/v1/auth/login")
            .add_header(forwarded.clone(), HeaderValue::from_static("198.51.100.4"))
            .json(&json!({ "login": format!("nobody{}", i), "password": "whatever" }))
            .await
            .status_code();
        if i < 10 {
            assert_eq!(last, StatusCode::UNAUTHORIZED);
        }
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_header_ignored_without_proxy() {
    let server = server().await;
    let forwarded = HeaderName::from_static("x-forwarded-for");
    for i in 0..12 {
        let response = server
            .post("/api/v1/auth/login")
            .add_header(forwarded.clone(), HeaderValue::from_static("198.51.100.4"))
            .json(&json!({ "login": format!("nobody{}", i), "password": "whatever" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_ip_throttle_uses_peer_address() {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    let app = build_router(AppState::new(pool, test_config()).unwrap());

    let login = |i: usize, forwarded: &'static str| {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", forwarded)
            .body(Body::from(
                json!({ "login": format!("nobody{}", i), "password": "whatever" }).to_string(),
            ))
            .unwrap();
        let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    };

    // A different spoofed header on every attempt still lands in one bucket
    let spoofed = [
        "203.0.113.1", "203.0.113.2", "203.0.113.3", "203.0.113.4", "203.0.113.5",
        "203.0.113.6", "203.0.113.7", "203.0.113.8", "203.0.113.9", "203.0.113.10",
        "203.0.113.11",
    ];
    let mut statuses = Vec::new();
    for (i, forwarded) in spoofed.into_iter().enumerate() {
        let response = app.clone().oneshot(login(i, forwarded)).await.unwrap();
        statuses.push(response.status());
    }
    assert!(statuses[..10].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_concurrent_setup_registrations() {
    let server = server().await;
    let body = |name: &str| {
        json!({
            "username": name,
            "email": format!("{}@example.com", name),
            "password": "correct horse battery",
        })
    };
    let (first, second) = tokio::join!(
        server.post("/api/v1/auth/register").json(&body("alice")).into_future(),
        server.post("/api/v1/auth/register").json(&body("mallory")).into_future(),
    );

    let mut statuses = [first.status_code(), second.status_code()];
    statuses.sort_by_key(|status| status.as_u16());
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::FORBIDDEN]);
    let created = if first.status_code() == StatusCode::CREATED { first } else { second };
    assert_eq!(created.json::<Value>()["user"]["role"], "admin");
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let mut config = test_config();
    config.auth.allow_registration = true;
    let server = server_with(config).await;
    register(&server, "admin").await;
    let user_token = register(&server, "reader").await;

    let response = server
        .post("/api/v1/tags")
        .add_header(header::AUTHORIZATION, bearer(&user_token))
        .json(&json!({ "name": "Rust" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let anonymous = server.post("/api/v1/tags").json(&json!({ "name": "Rust" })).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_blog_publishing_flow() {
    let server = server().await;
    let token = register(&server, "alice").await;

    let created = server
        .post("/api/v1/blogs")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Hello World",
            "content": "First post body",
            "status": "published",
            "tags": ["Rust", "Web"],
        }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let created = created.json::<Value>();
    assert_eq!(created["slug"], "hello-world");
    assert!(created["published_at"].is_string());

    let draft = server
        .post("/api/v1/blogs")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "Work in progress", "content": "todo" }))
        .await
        .json::<Value>();

    let list = server.get("/api/v1/blogs").await.json::<Value>();
    assert_eq!(list["total"], 1);
    assert_eq!(list["total_pages"], 1);
    assert_eq!(list["items"][0]["slug"], "hello-world");
    assert_eq!(list["items"][0]["tags"].as_array().unwrap().len(), 2);

    let detail = server.get("/api/v1/blogs/hello-world").await;
    assert_eq!(detail.status_code(), StatusCode::OK);
    assert_eq!(detail.json::<Value>()["comment_count"], 0);

    let hidden = server.get(&format!("/api/v1/blogs/{}", draft["slug"].as_str().unwrap())).await;
    assert_eq!(hidden.status_code(), StatusCode::NOT_FOUND);

    let drafts = server
        .get("/api/v1/admin/blogs")
        .add_query_param("status", "draft")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(drafts["total"], 1);

    let by_tag = server.get("/api/v1/tags/rust/blogs").await.json::<Value>();
    assert_eq!(by_tag["tag"]["name"], "Rust");
    assert_eq!(by_tag["total"], 1);

    let tags = server.get("/api/v1/tags").await.json::<Value>();
    assert_eq!(tags.as_array().unwrap().len(), 2);

    let deleted = server
        .delete(&format!("/api/v1/blogs/{}", created["id"]))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(server.get("/api/v1/blogs").await.json::<Value>()["total"], 0);
}

#[tokio::test]
async fn test_comment_threads() {
    let server = server().await;
    let token = register(&server, "alice").await;
    server
        .post("/api/v1/blogs")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "Threads", "content": "Body", "status": "published" }))
        .await;

    let top = server
        .post("/api/v1/blogs/threads/comments")
        .json(&json!({ "author_name": "Ann", "author_email": "ann@example.com", "content": "Nice" }))
        .await;
    assert_eq!(top.status_code(), StatusCode::CREATED);
    let top_id = top.json::<Value>()["id"].as_i64().unwrap();

    let reply = server
        .post("/api/v1/blogs/threads/comments")
        .json(&json!({ "parent_id": top_id, "author_name": "Ben", "content": "Agreed" }))
        .await;
    assert_eq!(reply.status_code(), StatusCode::CREATED);
    let reply_id = reply.json::<Value>()["id"].as_i64().unwrap();

    let nested = server
        .post("/api/v1/blogs/threads/comments")
        .json(&json!({ "parent_id": reply_id, "author_name": "Cat", "content": "Too deep" }))
        .await;
    assert_eq!(nested.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(nested.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    let threads = server.get("/api/v1/blogs/threads/comments").await.json::<Value>();
    assert_eq!(threads.as_array().unwrap().len(), 1);
    assert_eq!(threads[0]["replies"][0]["author_name"], "Ben");
    assert!(threads[0]["avatar_url"].as_str().unwrap().contains("gravatar"));

    let missing = server
        .post("/api/v1/blogs/nope/comments")
        .json(&json!({ "author_name": "Ann", "content": "Hi" }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_projects_and_gallery() {
    let server = server().await;
    let token = register(&server, "alice").await;

    let project = server
        .post("/api/v1/projects")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Folio",
            "description": "This site",
            "tech_stack": ["Rust", "rust", "SQLite"],
            "featured": true,
        }))
        .await;
    assert_eq!(project.status_code(), StatusCode::CREATED);
    assert_eq!(project.json::<Value>()["tech_stack"], json!(["Rust", "SQLite"]));

    let featured = server
        .get("/api/v1/projects")
        .add_query_param("featured", "true")
        .await
        .json::<Value>();
    assert_eq!(featured.as_array().unwrap().len(), 1);
    assert_eq!(server.get("/api/v1/projects/folio").await.status_code(), StatusCode::OK);

    for (title, category) in [("Dunes", "travel"), ("Harbour", "travel"), ("Cat", "pets")] {
        let item = server
            .post("/api/v1/gallery")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "title": title, "image_url": "/img/x.jpg", "category": category }))
            .await;
        assert_eq!(item.status_code(), StatusCode::CREATED);
    }
    let travel = server
        .get("/api/v1/gallery")
        .add_query_param("category", "travel")
        .add_query_param("per_page", "1")
        .await
        .json::<Value>();
    assert_eq!(travel["total"], 2);
    assert_eq!(travel["total_pages"], 2);
    assert_eq!(travel["items"].as_array().unwrap().len(), 1);

    let categories = server.get("/api/v1/gallery/categories").await.json::<Value>();
    assert_eq!(categories.as_array().unwrap().len(), 2);
    assert_eq!(server.get("/api/v1/gallery/999").await.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_url_validation() {
    let server = server().await;
    let token = register(&server, "alice").await;
    create_link(&server, &token, "docs").await;

    for (body, status) in [
        (json!({ "destination": "javascript:alert(1)" }), StatusCode::BAD_REQUEST),
        (json!({ "destination": "https://x.example.invalid/", "slug": "admin" }), StatusCode::BAD_REQUEST),
        (json!({ "destination": "https://x.example.invalid/", "slug": "has space" }), StatusCode::BAD_REQUEST),
        (json!({ "destination": "https://x.example.invalid/", "slug": "docs" }), StatusCode::CONFLICT),
    ] {
        let response = server
            .post("/api/v1/short-urls")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&body)
            .await;
        assert_eq!(response.status_code(), status, "{}", body);
    }

    let random = server
        .post("/api/v1/short-urls")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "destination": "https://x.example.invalid/" }))
        .await
        .json::<Value>();
    assert_eq!(random["slug"].as_str().unwrap().len(), 7);

    let list = server
        .get("/api/v1/short-urls")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(list["total"], 2);
}

#[tokio::test]
async fn test_short_link_decision_tree() {
    let server = server().await;
    let token = register(&server, "alice").await;
    let link = create_link(&server, &token, "docs").await;
    let id = link["id"].as_i64().unwrap();

    let bot = server
        .get("/s/docs")
        .add_header(header::USER_AGENT, HeaderValue::from_static(CRAWLER))
        .await;
    assert_eq!(bot.status_code(), StatusCode::OK);
    let html = bot.text();
    assert!(html.contains("og:url"));
    assert!(!html.contains(r#"id="count""#));
    assert_eq!(clicks(&server, &token, id).await, 1);

    let human = server
        .get("/s/docs")
        .add_header(header::USER_AGENT, HeaderValue::from_static(BROWSER))
        .await;
    assert_eq!(human.status_code(), StatusCode::OK);
    assert!(human.text().contains("var left = 3;"));

    let mut counted = false;
    for _ in 0..50 {
        if clicks(&server, &token, id).await == 2 {
            counted = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(counted);

    let missing = server.get("/s/unknown").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    assert!(missing.text().contains("<html"));

    server
        .put(&format!("/api/v1/short-urls/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "is_active": false }))
        .await;
    let inactive = server
        .get("/s/docs")
        .add_header(header::USER_AGENT, HeaderValue::from_static(CRAWLER))
        .await;
    assert_eq!(inactive.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alternate_handlers() {
    let mut config = test_config();
    config
        .redirect
        .static_redirects
        .insert("cv".to_string(), "https://cv.example.invalid/".to_string());
    let server = server_with(config).await;
    let token = register(&server, "alice").await;
    create_link(&server, &token, "docs").await;

    let direct = server.get("/api/direct/docs").await;
    assert_eq!(direct.status_code(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(direct.header(header::LOCATION), "https://docs.example.invalid/guide");

    let fast = server.get("/api/fast/docs").await;
    assert_eq!(fast.status_code(), StatusCode::OK);
    assert!(fast.text().contains("http-equiv=\"refresh\""));

    let ultra = server.get("/api/ultra-fast/cv").await;
    assert_eq!(ultra.header(header::LOCATION), "https://cv.example.invalid/");

    let edge = server.get("/api/edge/docs").await;
    assert_eq!(edge.status_code(), StatusCode::TEMPORARY_REDIRECT);
    let cache_control = edge.header(header::CACHE_CONTROL);
    assert!(cache_control.to_str().unwrap().contains("s-maxage"));

    let miss = server.get("/api/edge/nothing").await;
    assert_eq!(miss.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(miss.header(header::CACHE_CONTROL), "no-store");
}

#[tokio::test]
async fn test_view_counters() {
    let server = server().await;
    for expected in 1..=2 {
        let response = server.post("/api/v1/views/blog/hello-world").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["views"], expected);
    }
    let current = server.get("/api/v1/views/blog/hello-world").await.json::<Value>();
    assert_eq!(current["slug"], "blog/hello-world");
    assert_eq!(current["views"], 2);
    assert_eq!(server.get("/api/v1/views/unseen").await.json::<Value>()["views"], 0);

    let top = server.get("/api/v1/views").await.json::<Value>();
    assert_eq!(top[0]["slug"], "blog/hello-world");
}

#[tokio::test]
async fn test_feed() {
    let server = server().await;
    let token = register(&server, "alice").await;
    server
        .post("/api/v1/blogs")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "Feed me", "content": "Body", "status": "published" }))
        .await;

    let feed = server.get("/feed.xml").await;
    assert_eq!(feed.status_code(), StatusCode::OK);
    assert!(feed
        .header(header::CONTENT_TYPE)
        .to_str()
        .unwrap()
        .starts_with("application/rss+xml"));
    assert!(feed.text().contains("http://localhost:8080/blog/feed-me"));
}

#[tokio::test]
async fn test_setup_state_and_password_change() {
    let server = server().await;
    let before = server.get("/api/v1/auth/has-admin").await.json::<Value>();
    assert_eq!(before["has_admin"], false);

    let token = register(&server, "alice").await;
    assert_eq!(server.get("/api/v1/auth/has-admin").await.json::<Value>()["has_admin"], true);

    let wrong = server
        .put("/api/v1/auth/password")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "current_password": "nope", "new_password": "a brand new secret" }))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::BAD_REQUEST);

    let changed = server
        .put("/api/v1/auth/password")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "current_password": "correct horse battery", "new_password": "a brand new secret" }))
        .await;
    assert_eq!(changed.status_code(), StatusCode::NO_CONTENT);

    let login = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "alice", "password": "a brand new secret" }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);

    let logout = server.post("/api/v1/auth/logout").await;
    assert_eq!(logout.status_code(), StatusCode::NO_CONTENT);
    assert!(logout.header(header::SET_COOKIE).to_str().unwrap().contains("Max-Age=0"));
}
