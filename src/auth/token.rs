// Bearer-token validation. Tokens are issued by the platform auth service
// with a shared HS256 secret; this core only validates them.

use crate::auth::error::AuthError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32, // user_id
    pub email: String,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Token service for JWT validation
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Validate a bearer token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Mint a token with the shared secret. The production issuer is the
    /// auth service; this exists for local tooling and tests.
    pub fn issue(&self, user_id: i32, email: &str, ttl_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_token_service() -> TokenService {
        TokenService::new("test_secret_key_for_testing_purposes".to_string())
    }

    #[test]
    fn test_valid_token_round_trip() {
        let service = test_token_service();
        let token = service.issue(42, "driver@example.com", 900).unwrap();
        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "driver@example.com");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = test_token_service();
        let token = service.issue(1, "late@example.com", -120).unwrap();
        match service.validate(&token) {
            Err(AuthError::TokenExpired) => {}
            other => panic!("Expected TokenExpired, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = test_token_service();
        assert!(service.validate("").is_err());
        assert!(service.validate("not.a.token").is_err());
        assert!(service
            .validate("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature")
            .is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let service1 = TokenService::new("secret1".to_string());
        let service2 = TokenService::new("secret2".to_string());
        let token = service1.issue(1, "who@example.com", 900).unwrap();
        assert!(service1.validate(&token).is_ok());
        assert!(service2.validate(&token).is_err());
    }
}
