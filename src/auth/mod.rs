use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;

/// Session token claims. `sub` is the identity id issued at signup.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity_id: Uuid, email: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: identity_id,
            email,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token generation error: {0}")]
    Generation(String),
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Session secret not configured")]
    MissingSecret,
}

pub fn generate_session_token(claims: &Claims) -> Result<String, TokenError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| TokenError::Generation(e.to_string()))
}

pub fn validate_session_token(token: &str) -> Result<Claims, TokenError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| TokenError::Invalid(e.to_string()))?;

    Ok(token_data.claims)
}

/// Salted password digest stored alongside the identity row.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trip() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "owner@example.com".to_string());
        let token = generate_session_token(&claims).unwrap();

        let decoded = validate_session_token(&token).unwrap();
        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.email, "owner@example.com");
    }

    #[test]
    fn tampered_token_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "owner@example.com".to_string());
        let mut token = generate_session_token(&claims).unwrap();
        token.push('x');

        assert!(validate_session_token(&token).is_err());
    }

    #[test]
    fn password_verification() {
        let salt = generate_salt();
        let hash = hash_password("s3cret-passphrase", &salt);

        assert!(verify_password("s3cret-passphrase", &salt, &hash));
        assert!(!verify_password("wrong", &salt, &hash));

        // Same password, different salt: different digest
        let other_salt = generate_salt();
        assert_ne!(hash, hash_password("s3cret-passphrase", &other_salt));
    }
}
