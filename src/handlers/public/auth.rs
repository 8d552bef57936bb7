use axum::{extract::State, http::HeaderMap, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::identity::IdentityMetadata;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/signup - create an identity and provision its tenant
///
/// Signup is the explicit provisioning path: the organization and owner
/// profile are created here, so the first authenticated request does not
/// have to go through lazy provisioning.
pub async fn signup_post(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let mut metadata = IdentityMetadata::default();
    if let Some(company) = payload.company_name.as_deref().filter(|v| !v.is_empty()) {
        metadata.set_company_name(company);
    }
    if let Some(first) = payload.first_name.as_deref().filter(|v| !v.is_empty()) {
        metadata.set_first_name(first);
    }
    if let Some(last) = payload.last_name.as_deref().filter(|v| !v.is_empty()) {
        metadata.set_last_name(last);
    }

    let identity = state.identity.sign_up(&email, &payload.password, metadata).await?;
    let provisioned = state.provisioning.ensure_provisioned(&identity).await?;

    tracing::info!(
        identity = %identity.id,
        organization = %provisioned.organization.id,
        "account created"
    );

    Ok(Json(json!({
        "message": "Account created",
        "user": {
            "id": identity.id,
            "email": identity.email,
            "organizationId": provisioned.organization.id,
            "organizationSlug": provisioned.organization.slug,
            "role": provisioned.profile.role,
        }
    })))
}

/// POST /api/auth/signin - exchange credentials for a session token
pub async fn signin_post(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let session = state.identity.sign_in(&email, &payload.password).await?;

    Ok(Json(json!({
        "token": session.token,
        "expiresAt": session.expires_at,
        "user": {
            "id": session.identity.id,
            "email": session.identity.email,
        }
    })))
}

/// POST /api/auth/signout - end the current session
///
/// Session tokens are stateless, so this is an acknowledgement; the client
/// discards its token/cookie.
pub async fn signout_post(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state.identity.sign_out(&headers).await?;
    Ok(Json(json!({ "message": "Signed out" })))
}
