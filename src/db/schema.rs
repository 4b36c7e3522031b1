//! SQL DDL for initializing the control-plane tables.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `accounts`: tenant rows carrying the custom domain, its verification
///   token and status. Domains are unique case-insensitively.
/// - `buckets`: bucket names per account, `(account_id, name)` UNIQUE
/// - `sftp_credentials`: at most one row per account (`account_id` UNIQUE);
///   only the SHA-256 of the password is kept
/// - `audit_logs`: append-only operator actions, `details` is JSON text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NULL,
    custom_domain TEXT NULL,
    domain_status TEXT NOT NULL DEFAULT 'pending', -- pending | active | failed
    dns_verification_token TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_custom_domain
    ON accounts(lower(custom_domain)) WHERE custom_domain IS NOT NULL;

CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (account_id, name)
);

CREATE TABLE IF NOT EXISTS sftp_credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id),
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active', -- active | revoked
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    action TEXT NOT NULL,
    resource TEXT NOT NULL,
    details TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_logs_account_id ON audit_logs(account_id);
"#;
