use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::router::AppState;

/// Ensure the inbound request carries the admin key.
/// Accepts either:
/// - Header: `x-api-key: ...`
/// - Header: `Authorization: Bearer ...`
///
/// A blank configured key rejects everything.
pub fn ensure_authorized(headers: &HeaderMap, expected: &str) -> Result<(), Response> {
    if expected.trim().is_empty() {
        return Err(unauthorized());
    }
    let matches = |candidate: &str| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()));

    // 1) header: x-api-key
    if let Some(hv) = headers.get("x-api-key").and_then(|v| v.to_str().ok())
        && matches(hv)
    {
        return Ok(());
    }

    // 2) header: Authorization: Bearer <key>
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && matches(token)
        {
            return Ok(());
        }
    }

    Err(unauthorized())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "UNAUTHORIZED", "message": "invalid or missing key"}})),
    )
        .into_response()
}

#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<AppState> for RequireAdminKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        ensure_authorized(&parts.headers, &state.admin_key)?;
        Ok(Self)
    }
}
