use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{self, Claims, TokenError};
use crate::config;
use crate::store::StoreError;

const KEY_COMPANY_NAME: &str = "company_name";
const KEY_FIRST_NAME: &str = "first_name";
const KEY_LAST_NAME: &str = "last_name";

/// Write-once metadata bag supplied at signup. Lookups are named and typed;
/// absent keys fall back explicitly at the call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata(HashMap<String, String>);

impl IdentityMetadata {
    pub fn company_name(&self) -> Option<&str> {
        self.get(KEY_COMPANY_NAME)
    }

    pub fn first_name(&self) -> Option<&str> {
        self.get(KEY_FIRST_NAME)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.get(KEY_LAST_NAME)
    }

    pub fn set_company_name(&mut self, value: impl Into<String>) {
        self.0.insert(KEY_COMPANY_NAME.to_string(), value.into());
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) {
        self.0.insert(KEY_FIRST_NAME.to_string(), value.into());
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) {
        self.0.insert(KEY_LAST_NAME.to_string(), value.into());
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// An authenticated principal. Immutable from this system's perspective
/// except for the metadata bag, which is write-once at signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub metadata: IdentityMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Identity store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token error: {0}")]
    Token(String),
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(msg) => IdentityError::InvalidToken(msg),
            other => IdentityError::Token(other.to_string()),
        }
    }
}

/// Identity provider collaborator: issues and validates sessions, resolves
/// the caller behind a request. Absent or invalid credentials resolve to
/// `Ok(None)`, not an error; errors mean the provider itself failed.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self, headers: &HeaderMap)
        -> Result<Option<Identity>, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: IdentityMetadata,
    ) -> Result<Identity, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Sessions are stateless tokens; signing out is a client-side discard.
    async fn sign_out(&self, _headers: &HeaderMap) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// Extract the session token from `Authorization: Bearer ...` or, failing
/// that, from the configured session cookie.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    let cookie_name = &config::config().security.session_cookie;
    let cookies = headers.get("cookie").and_then(|v| v.to_str().ok())?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        if name == cookie_name {
            let value = parts.next().unwrap_or("").trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Flat identity row. The password digest never leaves this module.
#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    password_hash: String,
    password_salt: String,
    metadata: sqlx::types::Json<IdentityMetadata>,
}

impl IdentityRow {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
            metadata: self.metadata.0,
        }
    }
}

/// Postgres-backed identity provider issuing JWT session tokens.
#[derive(Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn identity_row_by_email(&self, email: &str) -> Result<Option<IdentityRow>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash, password_salt, metadata \
             FROM identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn identity_row_by_id(&self, id: Uuid) -> Result<Option<IdentityRow>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash, password_salt, metadata \
             FROM identities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn current_identity(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, IdentityError> {
        let token = match session_token_from_headers(headers) {
            Some(token) => token,
            None => return Ok(None),
        };

        // A malformed or expired token is "no identity", not a failure.
        let claims = match auth::validate_session_token(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                return Ok(None);
            }
        };

        let row = self.identity_row_by_id(claims.sub).await?;
        Ok(row.map(IdentityRow::into_identity))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: IdentityMetadata,
    ) -> Result<Identity, IdentityError> {
        let salt = auth::generate_salt();
        let hash = auth::hash_password(password, &salt);

        let insert = sqlx::query_as::<_, IdentityRow>(
            r#"
            INSERT INTO identities (id, email, password_hash, password_salt, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, password_salt, metadata
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(&hash)
        .bind(&salt)
        .bind(sqlx::types::Json(&metadata))
        .fetch_one(&self.pool)
        .await;

        match insert {
            Ok(row) => Ok(row.into_identity()),
            Err(e) => match StoreError::from(e) {
                StoreError::UniqueViolation(_) => Err(IdentityError::EmailTaken),
                other => Err(IdentityError::Store(other)),
            },
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let row = self
            .identity_row_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if !auth::verify_password(password, &row.password_salt, &row.password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        let identity = row.into_identity();
        let claims = Claims::new(identity.id, identity.email.clone());
        let token = auth::generate_session_token(&claims)?;

        Ok(Session {
            token,
            expires_at: claims.expires_at(),
            identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn metadata_named_lookups() {
        let mut metadata = IdentityMetadata::default();
        assert!(metadata.company_name().is_none());

        metadata.set_company_name("Syndic Lyon Centre");
        metadata.set_first_name("Claire");
        assert_eq!(metadata.company_name(), Some("Syndic Lyon Centre"));
        assert_eq!(metadata.first_name(), Some("Claire"));
        assert!(metadata.last_name().is_none());
    }

    #[test]
    fn empty_metadata_values_fall_back() {
        let mut metadata = IdentityMetadata::default();
        metadata.set_company_name("");
        assert!(metadata.company_name().is_none());
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(
            session_token_from_headers(&headers),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn empty_bearer_token_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(session_token_from_headers(&headers), None);
    }

    #[test]
    fn session_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; copronomie_session=tok123; lang=fr"),
        );
        assert_eq!(session_token_from_headers(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_token_from_headers(&headers), None);
    }
}
