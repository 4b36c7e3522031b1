pub mod accounts;
pub mod domain;
pub mod sftp;

use crate::router::AppState;
use serde_json::Value;
use tracing::warn;

/// Record an operator action. A failed write is logged and otherwise
/// ignored so the action itself still returns its result (SFTP passwords
/// in particular cannot be shown again).
pub(crate) async fn audit(
    state: &AppState,
    account_id: i64,
    action: &str,
    resource: &str,
    details: Value,
) {
    if let Err(e) = state
        .storage
        .insert_audit_log(account_id, action, resource, &details)
        .await
    {
        warn!(account_id, action, error = %e, "failed to write audit log");
    }
}
