use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Progress of a custom-domain ownership check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DomainStatus {
    Pending,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SftpStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbAccount {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub custom_domain: Option<String>,
    pub domain_status: DomainStatus,
    #[serde(skip_serializing)]
    pub dns_verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbAccount {
    /// True only once a DNS check has succeeded for the current domain.
    pub fn domain_verified(&self) -> bool {
        self.custom_domain.is_some() && self.domain_status == DomainStatus::Active
    }
}

/// Account as returned by the API, with the derived `domainVerified` flag.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(flatten)]
    pub account: DbAccount,
    pub domain_verified: bool,
}

impl From<DbAccount> for AccountView {
    fn from(account: DbAccount) -> Self {
        Self {
            domain_verified: account.domain_verified(),
            account,
        }
    }
}

/// The slice of an account the domain uniqueness check looks at.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AccountDomain {
    pub id: i64,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbBucket {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Stored SFTP identity. Not serializable: the API exposes
/// [`crate::sftp::SftpCredentialView`] instead so the hash never leaves the
/// process.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbSftpCredential {
    pub id: i64,
    pub account_id: i64,
    pub username: String,
    pub password_hash: String,
    pub status: SftpStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbAuditLog {
    pub id: i64,
    pub account_id: i64,
    pub action: String,
    pub resource: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}
