use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::handlers::audit;
use crate::middleware::auth::RequireAdminKey;
use crate::sftp::SftpConnectionInfo;
use crate::{ResellerError, router::AppState};

const RESOURCE: &str = "sftp_credentials";

/// GET /api/accounts/{id}/sftp -> credential summary (never the password).
pub async fn get_sftp(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    let credential = state.sftp.credential(account_id).await?;
    Ok(Json(json!({
        "credential": credential,
        "connection": state.sftp.connection_info(),
        "gatewayMode": state.sftp.gateway_mode(),
    })))
}

/// POST /api/accounts/{id}/sftp
pub async fn create_sftp(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    let created = state.sftp.create_user(account_id).await?;
    audit(
        &state,
        account_id,
        "SFTP_CREDENTIALS_CREATED",
        RESOURCE,
        json!({ "username": created.username }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "username": created.username,
            "password": created.password,
            "connection": state.sftp.connection_info(),
        })),
    ))
}

/// POST /api/accounts/{id}/sftp/reset-password
pub async fn reset_sftp_password(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    let password = state.sftp.reset_password(account_id).await?;
    audit(&state, account_id, "SFTP_PASSWORD_RESET", RESOURCE, json!({})).await;
    Ok(Json(json!({ "password": password })))
}

/// DELETE /api/accounts/{id}/sftp
pub async fn disable_sftp(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    state.sftp.disable_user(account_id).await?;
    audit(&state, account_id, "SFTP_CREDENTIALS_REVOKED", RESOURCE, json!({})).await;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/sftp/connection-info
pub async fn connection_info(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
) -> Json<SftpConnectionInfo> {
    Json(state.sftp.connection_info())
}
