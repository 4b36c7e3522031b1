use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::sftp::gateway::GatewayError;

#[derive(Debug, ThisError)]
pub enum ResellerError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid domain format")]
    InvalidDomain,

    #[error("This domain is already in use by another account")]
    DomainInUse,

    #[error("No domain configured for verification")]
    NoDomainConfigured,

    #[error("SFTP credentials already exist for this account")]
    SftpCredentialsExist,

    #[error("SFTP credentials not found")]
    SftpCredentialsNotFound,

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for ResellerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            ResellerError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            ResellerError::SftpCredentialsNotFound => {
                (StatusCode::NOT_FOUND, "SFTP_CREDENTIALS_NOT_FOUND")
            }
            ResellerError::InvalidDomain => (StatusCode::BAD_REQUEST, "INVALID_DOMAIN"),
            ResellerError::NoDomainConfigured => (StatusCode::BAD_REQUEST, "NO_DOMAIN"),
            ResellerError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ResellerError::DomainInUse => (StatusCode::CONFLICT, "DOMAIN_IN_USE"),
            ResellerError::SftpCredentialsExist => {
                (StatusCode::CONFLICT, "SFTP_CREDENTIALS_EXIST")
            }
            ResellerError::Gateway(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            ResellerError::DatabaseError(_) | ResellerError::Json(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "internal error while handling request");
            "An internal server error occurred.".to_string()
        } else {
            self.to_string()
        };

        let body = ApiErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
