//! JSON Web Token issuing and validation
//!
//! Tokens are HS256-signed and carry the user id, name and role so the auth
//! middleware can authorise a request without a database round trip.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::models::{User, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1) as i64),
        }
    }

    /// Build from config, generating a throwaway secret when none is set
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = if config.jwt_secret.trim().is_empty() {
            tracing::warn!("auth.jwt_secret is empty; using a random secret, tokens will not survive a restart");
            random_secret()
        } else {
            config.jwt_secret.clone()
        };
        Self::new(&secret, config.token_ttl_hours)
    }

    /// Lifetime of issued tokens, in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Verify signature and expiry
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default()).map(|data| data.claims)
    }
}

fn random_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let mut user = User::new("ada".into(), "ada@example.com".into(), "h".into(), role);
        user.id = 7;
        user
    }

    #[test]
    fn test_issue_and_validate() {
        let service = JwtService::new("test-secret", 1);
        let token = service.issue(&user(UserRole::Admin)).unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtService::new("one", 1).issue(&user(UserRole::User)).unwrap();
        assert!(JwtService::new("two", 1).validate(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(JwtService::new("s", 1).validate("not.a.token").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new("s", 1);
        let past = Utc::now() - Duration::hours(3);
        let claims = Claims {
            sub: 1,
            username: "ada".into(),
            role: UserRole::User,
            iat: past.timestamp(),
            exp: (past + Duration::hours(1)).timestamp(),
            jti: "x".into(),
        };
        let token = encode(&Header::default(), &claims, &service.encoding_key).unwrap();
        assert!(service.validate(&token).is_err());
    }

    #[test]
    fn test_empty_secret_generates_one() {
        let config = AuthConfig {
            jwt_secret: String::new(),
            ..AuthConfig::default()
        };
        let service = JwtService::from_config(&config);
        let token = service.issue(&user(UserRole::User)).unwrap();
        assert!(service.validate(&token).is_ok());
        assert_ne!(random_secret(), random_secret());
    }
}
