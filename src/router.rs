use axum::{
    Json, Router,
    routing::{get, patch, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::Storage;
use crate::domain::DomainVerifier;
use crate::handlers::{accounts, domain, sftp};
use crate::sftp::SftpProvisioner;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub domains: Arc<DomainVerifier>,
    pub sftp: Arc<SftpProvisioner>,
    pub admin_key: Arc<str>,
}

impl AppState {
    pub fn new(
        storage: Storage,
        domains: DomainVerifier,
        sftp: SftpProvisioner,
        admin_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            storage,
            domains: Arc::new(domains),
            sftp: Arc::new(sftp),
            admin_key: admin_key.into(),
        }
    }
}

pub fn reseller_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/accounts", post(accounts::create_account))
        .route(
            "/api/accounts/{id}/domain",
            patch(domain::configure_domain).delete(domain::remove_domain),
        )
        .route("/api/accounts/{id}/domain/verify", post(domain::verify_domain))
        .route("/api/accounts/{id}/buckets", post(accounts::create_bucket))
        .route(
            "/api/accounts/{id}/sftp",
            get(sftp::get_sftp)
                .post(sftp::create_sftp)
                .delete(sftp::disable_sftp),
        )
        .route(
            "/api/accounts/{id}/sftp/reset-password",
            post(sftp::reset_sftp_password),
        )
        .route("/api/accounts/{id}/audit-logs", get(accounts::list_audit_logs))
        .route("/api/sftp/connection-info", get(sftp::connection_info))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
