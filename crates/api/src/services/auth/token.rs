//! HS256 bearer tokens.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use emporium_core::{Role, UserId};

use super::AuthError;
use crate::config::JwtConfig;
use crate::models::user::User;

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        UserId::new(self.sub)
    }
}

/// Signing and verification keys derived from `JWT_SECRET`.
///
/// Implements `Debug` manually so keys never reach logs.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwtKeys {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: config.ttl,
        }
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Sign a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::TokenIssue("token lifetime out of range".to_owned()))?;
        let claims = Claims {
            sub: user.id.as_i32(),
            email: user.email.as_str().to_owned(),
            role: user.role,
            iat: now,
            exp: now + ttl,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Verify signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any verification failure.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use emporium_core::Email;

    use super::*;

    fn keys(secret: &str, ttl: u64) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: SecretString::from(secret),
            ttl: Duration::from_secs(ttl),
        })
    }

    fn user() -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("moderator@shop.test").unwrap(),
            name: "Mod".into(),
            phone: None,
            role: Role::Moderator,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!", 3600);
        let token = keys.issue(&user()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id(), UserId::new(7));
        assert_eq!(claims.role, Role::Moderator);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = keys("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!", 3600)
            .issue(&user())
            .unwrap();
        let other = keys("Zx4Rt7Np1Wc6Hy3Bd5Fg0Jsk9Vq2Lm8?", 3600);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = keys("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!", 3600);
        assert!(keys.verify("not.a.token").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let keys = keys("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!", 60);
        assert!(format!("{keys:?}").contains("[REDACTED]"));
    }
}
