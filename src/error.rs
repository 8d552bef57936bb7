// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::identity::IdentityError;
use crate::services::provisioning::ProvisioningError;
use crate::store::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),
    /// No valid identity on a gated endpoint (code AUTH_REQUIRED)
    AuthRequired(String),

    // 403 Forbidden
    Forbidden(String),
    /// Valid identity but no tenant membership (code PROFILE_REQUIRED)
    ProfileRequired(String),
    /// Lazy provisioning ran and failed (code PROVISIONING_FAILED)
    ProvisioningFailed(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::AuthRequired(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::ProfileRequired(_) => 403,
            ApiError::ProvisioningFailed(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::AuthRequired(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::ProfileRequired(msg) => msg,
            ApiError::ProvisioningFailed(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get stable error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::AuthRequired(_) => "AUTH_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::ProfileRequired(_) => "PROFILE_REQUIRED",
            ApiError::ProvisioningFailed(_) => "PROVISIONING_FAILED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn auth_required(message: impl Into<String>) -> Self {
        ApiError::AuthRequired(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn profile_required(message: impl Into<String>) -> Self {
        ApiError::ProfileRequired(message.into())
    }

    pub fn provisioning_failed(message: impl Into<String>) -> Self {
        ApiError::ProvisioningFailed(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert collaborator errors to ApiError. Internal causes are logged and
// replaced with generic client messages.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::UniqueViolation(constraint) => {
                tracing::debug!("Unique constraint violated: {}", constraint);
                ApiError::conflict("Record already exists")
            }
            StoreError::ConfigMissing(key) => {
                tracing::error!("Store configuration missing: {}", key);
                ApiError::service_unavailable("Storage temporarily unavailable")
            }
            StoreError::QueryError(msg) => {
                tracing::error!("Store query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            StoreError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailTaken => {
                ApiError::conflict("An account with this email already exists")
            }
            IdentityError::InvalidCredentials => {
                ApiError::unauthorized("Invalid email or password")
            }
            IdentityError::InvalidToken(msg) => {
                tracing::debug!("Session token rejected: {}", msg);
                ApiError::auth_required("Authentication required")
            }
            IdentityError::Store(store_err) => store_err.into(),
            IdentityError::Token(msg) => {
                tracing::error!("Session token generation failed: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        tracing::error!("Provisioning failed: {}", err);
        ApiError::provisioning_failed("Account setup failed, please contact support")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
