use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::audit;
use crate::db::{AccountView, DbAuditLog};
use crate::middleware::auth::RequireAdminKey;
use crate::{ResellerError, router::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogView {
    pub id: i64,
    pub action: String,
    pub resource: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl From<DbAuditLog> for AuditLogView {
    fn from(row: DbAuditLog) -> Self {
        let details = row
            .details
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok())
            .unwrap_or(Value::Null);
        Self {
            id: row.id,
            action: row.action,
            resource: row.resource,
            details,
            created_at: row.created_at,
        }
    }
}

/// POST /api/accounts
pub async fn create_account(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ResellerError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ResellerError::Validation("Account name is required".to_string()));
    }
    let slug = req.slug.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let account = state.storage.create_account(name, slug).await?;
    info!(account_id = account.id, "account created");
    Ok((StatusCode::CREATED, Json(AccountView::from(account))))
}

/// POST /api/accounts/{id}/buckets
///
/// Also exposes the bucket to the account's SFTP user, if there is one.
pub async fn create_bucket(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<CreateBucketRequest>,
) -> Result<impl IntoResponse, ResellerError> {
    if !is_valid_bucket_name(&req.name) {
        return Err(ResellerError::Validation("Invalid bucket name".to_string()));
    }
    state
        .storage
        .get_account(account_id)
        .await?
        .ok_or(ResellerError::AccountNotFound)?;

    let bucket = state.storage.create_bucket(account_id, &req.name).await?;
    let sftp_synced = state.sftp.add_bucket(account_id, &bucket.name).await.is_ok();
    audit(
        &state,
        account_id,
        "bucket.created",
        "bucket",
        json!({ "bucketName": bucket.name, "sftpSynced": sftp_synced }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "bucket": bucket, "sftpSynced": sftp_synced })),
    ))
}

/// GET /api/accounts/{id}/audit-logs
pub async fn list_audit_logs(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Vec<AuditLogView>>, ResellerError> {
    let logs = state.storage.list_audit_logs(account_id).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

/// S3 naming: 3-63 chars of `[a-z0-9-]`, alphanumeric at both ends.
fn is_valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names() {
        assert!(is_valid_bucket_name("photos"));
        assert!(is_valid_bucket_name("backup-2024"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("Photos"));
        assert!(!is_valid_bucket_name("-photos"));
        assert!(!is_valid_bucket_name("pho_tos"));
    }
}
