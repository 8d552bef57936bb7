use axum::{body::Bytes, response::Json, Extension};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::pdf;

/// POST /api/devis/analyze - extract text from an uploaded quote PDF
///
/// Accepts the raw PDF body, validates it, and returns best-effort
/// normalized text. Extraction itself never fails; a scanned document
/// yields placeholder text the client can show to the user.
pub async fn analyze_post(
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    pdf::validate(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let text = pdf::extract_text(&body).await;

    tracing::info!(
        organization = %ctx.organization.id,
        bytes = body.len(),
        chars = text.chars().count(),
        "devis analyzed"
    );

    Ok(Json(json!({
        "organizationId": ctx.organization.id,
        "bytes": body.len(),
        "text": text,
    })))
}
