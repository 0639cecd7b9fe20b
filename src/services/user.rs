//! User service
//!
//! Registration, credential checks and token issuing. The first account ever
//! registered becomes the admin; later sign-ups are only accepted when
//! `auth.allow_registration` is set.

use crate::db::repositories::UserRepository;
use crate::models::{User, UserRole};
use crate::services::jwt::JwtService;
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    /// Username or email address
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

/// A signed-in user and their bearer token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
    pub expires_in: i64,
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    jwt: Arc<JwtService>,
    allow_registration: bool,
    /// Held from the first-user check until the insert
    register_lock: Mutex<()>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, jwt: Arc<JwtService>, allow_registration: bool) -> Self {
        Self {
            repo,
            jwt,
            allow_registration,
            register_lock: Mutex::new(()),
        }
    }

    /// Create an account and sign it in
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, UserServiceError> {
        validate_register_input(&input)?;

        let _guard = self.register_lock.lock().await;
        let is_first = self.repo.count().await.context("Failed to count users")? == 0;
        if !is_first && !self.allow_registration {
            return Err(UserServiceError::RegistrationClosed);
        }

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if self
            .repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if is_first { UserRole::Admin } else { UserRole::User };
        let password_hash = hash_password(&input.password)?;
        let user = self
            .repo
            .create(&User::new(username, email, password_hash, role))
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} ({})", user.username, user.role);
        self.session_for(user)
    }

    /// Check credentials and issue a token
    ///
    /// Unknown accounts and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, UserServiceError> {
        let login = input.login.trim();
        let user = match self
            .repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            Some(user) => Some(user),
            None => self
                .repo
                .get_by_email(login)
                .await
                .context("Failed to get user by email")?,
        };

        let user = user.ok_or(UserServiceError::InvalidCredentials)?;
        if !verify_password(&input.password, &user.password_hash)? {
            return Err(UserServiceError::InvalidCredentials);
        }

        self.session_for(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get user")?)
    }

    pub async fn has_users(&self) -> Result<bool, UserServiceError> {
        Ok(self.repo.count().await.context("Failed to count users")? > 0)
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self
            .repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::InvalidCredentials);
        }
        validate_password(new_password)?;

        self.repo
            .update_password(user.id, &hash_password(new_password)?)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    fn session_for(&self, user: User) -> Result<AuthSession, UserServiceError> {
        let token = self.jwt.issue(&user).context("Failed to sign token")?;
        Ok(AuthSession {
            user,
            token,
            expires_in: self.jwt.ttl_seconds(),
        })
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    let username = input.username.trim();
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > 50 {
        return Err(UserServiceError::ValidationError(
            "Username must be at most 50 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }

    let email = input.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ))
        }
    }

    validate_password(&input.password)
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
