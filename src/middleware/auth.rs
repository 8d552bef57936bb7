use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;
use crate::store::{Organization, Profile};

/// Resolved caller context injected into protected API handlers.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub identity: Identity,
    pub profile: Profile,
    pub organization: Organization,
}

/// Authenticated handler wrapper for API routes. Requires a resolved
/// (identity, profile, organization) triple before the handler runs and
/// standardizes the rejection codes. Deliberately does NOT provision: lazy
/// provisioning is the request gate's job upstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = state
        .identity
        .current_identity(request.headers())
        .await
        .map_err(|e| {
            tracing::error!("identity resolution failed: {}", e);
            ApiError::internal_server_error("An error occurred while processing your request")
        })?
        .ok_or_else(|| ApiError::auth_required("Authentication required"))?;

    let joined = state
        .store
        .profile_with_organization(identity.id)
        .await
        .map_err(|e| {
            tracing::error!("profile resolution failed: {}", e);
            ApiError::internal_server_error("An error occurred while processing your request")
        })?
        .ok_or_else(|| ApiError::profile_required("No profile for this account"))?;

    request.extensions_mut().insert(AuthContext {
        identity,
        profile: joined.profile,
        organization: joined.organization,
    });

    Ok(next.run(request).await)
}
