//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account (first one is admin)
//! - POST /api/v1/auth/login - Exchange credentials for a token
//! - POST /api/v1/auth/logout - Clear the token cookie
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password
//! - GET /api/v1/auth/has-admin - Whether first-run setup is done

use axum::{
    extract::{ConnectInfo, State},
    http::{header, Extensions, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::api::middleware::{
    extract_ip_address, ApiError, AppState, AuthenticatedUser, TOKEN_COOKIE,
};
use crate::models::User;
use crate::services::{AuthSession, LoginInput, RegisterInput, UserServiceError};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct HasAdminResponse {
    pub has_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Routes that need a valid token
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

/// Routes open to anyone
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/has-admin", get(has_admin))
}

fn session_response(session: AuthSession) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE, session.token, session.expires_in
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|_| ApiError::internal_error("Invalid cookie"))?,
    );

    Ok((
        headers,
        Json(AuthResponse {
            user: session.user,
            token: session.token,
            expires_in: session.expires_in,
        }),
    ))
}

/// GET /api/v1/auth/has-admin
///
/// The first account becomes the admin, so any account means setup is done.
async fn has_admin(State(state): State<AppState>) -> Result<Json<HasAdminResponse>, ApiError> {
    Ok(Json(HasAdminResponse {
        has_admin: state.user_service.has_users().await?,
    }))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.user_service.register(body).await?;
    tracing::info!("Registered user '{}' as {}", session.user.username, session.user.role.as_str());
    let (headers, body) = session_response(session)?;
    Ok((StatusCode::CREATED, headers, body))
}

/// POST /api/v1/auth/login
///
/// Throttled per client IP and per account.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    if let Some(ip) = extract_ip_address(&headers, peer, state.config.server.trust_proxy) {
        if state.rate_limiter.check_ip(ip).await {
            tracing::warn!("Login rate limit hit for {}", ip);
            return Err(ApiError::rate_limited("Too many requests, try again later", 60));
        }
    }

    let account = body.login.trim().to_string();
    if state.rate_limiter.is_account_limited(&account).await {
        tracing::warn!("Login locked for account '{}'", account);
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            900,
        ));
    }

    match state.user_service.login(body).await {
        Ok(session) => {
            state.rate_limiter.clear_account(&account).await;
            tracing::info!("User '{}' signed in", session.user.username);
            session_response(session)
        }
        Err(UserServiceError::InvalidCredentials) => {
            state.rate_limiter.record_failure(&account).await;
            Err(UserServiceError::InvalidCredentials.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless, so this only expires the cookie.
async fn logout() -> impl IntoResponse {
    let clear_cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", TOKEN_COOKIE);
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&clear_cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    (StatusCode::NO_CONTENT, headers)
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<User>, ApiError> {
    let found = state
        .user_service
        .get_by_id(user.0.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    Ok(Json(found))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(user.0.sub, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            UserServiceError::InvalidCredentials => {
                ApiError::validation_error("Current password is incorrect")
            }
            other => other.into(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}
