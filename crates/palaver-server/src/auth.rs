//! Connection-time authentication.
//!
//! Credential issuance lives in an external service; this module only
//! verifies the HMAC-signed tokens it hands out. Unauthenticated
//! connections are refused before any event is processed.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use palaver_shared::UserId;

use crate::error::ServerError;

/// Claims carried by a connection token. The issuer embeds the display
/// name so call events can be labelled without a user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated identity.
    pub sub: String,
    /// Display name, shown to call peers.
    pub name: String,
    /// Expiry (unix seconds).
    pub exp: u64,
}

/// An identity established from a verified token.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: UserId,
    pub name: String,
}

pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthedUser, ServerError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| ServerError::Unauthorized(format!("invalid token: {e}")))?;

        Ok(AuthedUser {
            id: UserId::new(data.claims.sub),
            name: data.claims.name,
        })
    }
}

/// Extract a bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".to_string()))?;

    auth.strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Unauthorized("expected a bearer token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn token(secret: &str, exp_offset_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            sub: "u1".to_string(),
            name: "Ada".to_string(),
            exp: (now + exp_offset_secs).max(0) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = TokenVerifier::new("secret");
        let user = verifier.verify(&token("secret", 3600)).unwrap();
        assert_eq!(user.id, UserId::new("u1"));
        assert_eq!(user.name, "Ada");
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = TokenVerifier::new("secret");
        assert!(verifier.verify(&token("other", 3600)).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = TokenVerifier::new("secret");
        assert!(verifier.verify(&token("secret", -3600)).is_err());
    }
}
