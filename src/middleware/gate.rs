use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::config::{self, GateConfig};
use crate::error::ApiError;
use crate::services::ProvisioningStage;
use crate::state::AppState;

/// Terminal outcome of the per-request gate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allowed,
    RedirectLogin,
    RedirectSetupError,
}

/// Allow-list membership: exact match against public page paths or prefix
/// match against public API namespaces. Case-sensitive, no pattern language.
pub fn is_public_path(gate: &GateConfig, path: &str) -> bool {
    gate.public_pages.iter().any(|p| p == path)
        || gate
            .public_api_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()))
}

/// Run identity and membership resolution for a protected request.
/// Never called for allow-listed paths, so public traffic costs no
/// identity-provider round trip.
pub async fn resolve(state: &AppState, headers: &HeaderMap) -> GateOutcome {
    let identity = match state.identity.current_identity(headers).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return GateOutcome::RedirectLogin,
        Err(e) => {
            // Fail closed on provider errors.
            tracing::warn!("identity resolution failed, failing closed: {}", e);
            return GateOutcome::RedirectLogin;
        }
    };

    // The fast path inside ensure_provisioned covers the profile-exists
    // transition; a write only happens for a first-time identity.
    match state.provisioning.ensure_provisioned(&identity).await {
        Ok(_) => GateOutcome::Allowed,
        Err(e) if e.stage == ProvisioningStage::LookupProfile => {
            tracing::warn!("membership lookup failed, failing closed: {}", e);
            GateOutcome::RedirectLogin
        }
        Err(e) => {
            tracing::error!(identity = %identity.id, "provisioning failed: {}", e);
            GateOutcome::RedirectSetupError
        }
    }
}

/// Request gate middleware. Page flows get redirects; requests under the
/// API prefix get machine-readable JSON rejections instead.
pub async fn request_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let gate = &config::config().gate;
    let path = request.uri().path().to_string();

    if is_public_path(gate, &path) {
        return next.run(request).await;
    }

    match resolve(&state, request.headers()).await {
        GateOutcome::Allowed => next.run(request).await,
        GateOutcome::RedirectLogin => {
            if path.starts_with(gate.api_prefix.as_str()) {
                ApiError::auth_required("Authentication required").into_response()
            } else {
                Redirect::to(&gate.login_path).into_response()
            }
        }
        GateOutcome::RedirectSetupError => {
            if path.starts_with(gate.api_prefix.as_str()) {
                ApiError::provisioning_failed("Account setup failed, please contact support")
                    .into_response()
            } else {
                Redirect::to(&gate.setup_error_path).into_response()
            }
        }
    }
}
