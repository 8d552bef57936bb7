use axum::{response::Json, Extension};
use serde_json::{json, Value};

use crate::middleware::AuthContext;

/// GET /api/auth/whoami - resolved caller, profile, and organization
pub async fn whoami_get(Extension(ctx): Extension<AuthContext>) -> Json<Value> {
    Json(json!({
        "user": {
            "id": ctx.identity.id,
            "email": ctx.identity.email,
        },
        "profile": {
            "firstName": ctx.profile.first_name,
            "lastName": ctx.profile.last_name,
            "role": ctx.profile.role,
        },
        "organization": {
            "id": ctx.organization.id,
            "name": ctx.organization.name,
            "slug": ctx.organization.slug,
            "plan": ctx.organization.plan,
            "quota": ctx.organization.quota,
            "subscriptionStatus": ctx.organization.subscription_status,
        }
    }))
}
