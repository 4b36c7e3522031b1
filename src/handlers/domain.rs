use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::{AccountView, DomainStatus};
use crate::domain::{
    generate_verification_token, is_domain_unique, is_valid_domain, normalize_domain,
};
use crate::handlers::audit;
use crate::middleware::auth::RequireAdminKey;
use crate::{ResellerError, router::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRequest {
    pub custom_domain: String,
}

/// PATCH /api/accounts/{id}/domain -> claim a domain and issue a fresh token.
pub async fn configure_domain(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<DomainRequest>,
) -> Result<impl IntoResponse, ResellerError> {
    if req.custom_domain.trim().is_empty() {
        return Err(ResellerError::Validation("Domain is required".to_string()));
    }
    if !is_valid_domain(&req.custom_domain) {
        return Err(ResellerError::InvalidDomain);
    }
    state
        .storage
        .get_account(account_id)
        .await?
        .ok_or(ResellerError::AccountNotFound)?;

    let claimed = state.storage.list_account_domains().await?;
    if !is_domain_unique(&req.custom_domain, &claimed, Some(account_id)) {
        return Err(ResellerError::DomainInUse);
    }

    let domain = normalize_domain(&req.custom_domain);
    let token = generate_verification_token();
    let account = state
        .storage
        .set_account_domain(account_id, &domain, &token)
        .await?;

    audit(
        &state,
        account_id,
        "account.domain_configured",
        "account",
        json!({ "customDomain": domain }),
    )
    .await;

    let instructions = state.domains.instructions(&domain, &token);
    Ok(Json(json!({
        "account": AccountView::from(account),
        "verificationToken": token,
        "instructions": instructions,
    })))
}

/// POST /api/accounts/{id}/domain/verify
pub async fn verify_domain(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    let account = state
        .storage
        .get_account(account_id)
        .await?
        .ok_or(ResellerError::AccountNotFound)?;
    let (Some(domain), Some(token)) = (account.custom_domain, account.dns_verification_token)
    else {
        return Err(ResellerError::NoDomainConfigured);
    };

    let result = state.domains.verify_ownership(&domain, &token).await;
    let status = if result.verified {
        DomainStatus::Active
    } else {
        DomainStatus::Failed
    };
    state.storage.set_domain_status(account_id, status).await?;

    let action = if result.verified {
        "account.domain_verified"
    } else {
        "account.domain_verification_failed"
    };
    audit(
        &state,
        account_id,
        action,
        "account",
        json!({ "customDomain": domain, "method": result.record_type }),
    )
    .await;

    Ok(Json(json!({
        "verified": result.verified,
        "status": status,
        "message": result.message,
        "recordType": result.record_type,
    })))
}

/// DELETE /api/accounts/{id}/domain
pub async fn remove_domain(
    _auth: RequireAdminKey,
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ResellerError> {
    let previous = state
        .storage
        .get_account(account_id)
        .await?
        .ok_or(ResellerError::AccountNotFound)?
        .custom_domain;

    let account = state.storage.clear_account_domain(account_id).await?;
    audit(
        &state,
        account_id,
        "account.domain_removed",
        "account",
        json!({ "customDomain": previous }),
    )
    .await;

    Ok(Json(json!({ "account": AccountView::from(account) })))
}
