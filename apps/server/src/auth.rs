//! JWT session tokens.
//!
//! A token only identifies the user. Role, store and enabled status are
//! read from the database on every request, so an edit or a disable takes
//! effect without waiting for the token to expire.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vitrina_core::password::{hash_password, verify_password};
use vitrina_core::User;

use crate::error::{ApiError, ApiResult};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username at the time of login, for logs
    pub username: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// Issues and checks tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Generate a token for a logged-in user.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to generate token: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// Validate and decode a token. Expired tokens are rejected.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Rejected token: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })?;

        Ok(token_data.claims)
    }
}

/// Extract a bearer token from an Authorization header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Hashes a new password on the blocking pool.
pub async fn hash_password_blocking(password: String) -> ApiResult<String> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing panicked: {}", e);
            ApiError::internal("Password hashing failed")
        })?;
    Ok(hashed?)
}

/// Checks a password on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("Password check panicked: {}", e);
            ApiError::internal("Password check failed")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            username: "caja1".to_string(),
            display_name: "Caja 1".to_string(),
            role_id: "r".to_string(),
            store_id: Some("s".to_string()),
            extra_permissions: Vec::new(),
            is_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let jwt = JwtManager::new("test-secret", 3600);
        let token = jwt.issue(&user()).unwrap();
        let claims = jwt.validate(&token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.username, "caja1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("one", 3600).issue(&user()).unwrap();
        assert!(JwtManager::new("two", 3600).validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60 s leeway.
        let jwt = JwtManager::new("test-secret", -120);
        let token = jwt.issue(&user()).unwrap();
        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc123"), None);
    }
}
