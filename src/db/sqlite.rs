use crate::db::models::{
    AccountDomain, DbAccount, DbAuditLog, DbBucket, DbSftpCredential, DomainStatus, SftpStatus,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::ResellerError;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const ACCOUNT_COLUMNS: &str =
    "id, name, slug, custom_domain, domain_status, dns_verification_token, created_at";
const SFTP_COLUMNS: &str = "id, account_id, username, password_hash, status, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and
    /// bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, ResellerError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // every in-memory connection is its own database, so pin to one
        let pool_opts = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let storage = Self::new(pool_opts.connect_with(connect_opts).await?);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), ResellerError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn create_account(
        &self,
        name: &str,
        slug: Option<&str>,
    ) -> Result<DbAccount, ResellerError> {
        let rec: (i64,) = sqlx::query_as(
            "INSERT INTO accounts (name, slug, domain_status, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(slug)
        .bind(DomainStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        self.get_account(rec.0)
            .await?
            .ok_or(ResellerError::AccountNotFound)
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<DbAccount>, ResellerError> {
        let account = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Every account that currently claims a domain.
    pub async fn list_account_domains(&self) -> Result<Vec<AccountDomain>, ResellerError> {
        let rows = sqlx::query_as::<_, AccountDomain>(
            "SELECT id, custom_domain FROM accounts WHERE custom_domain IS NOT NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Store a new domain claim. Resets the status to pending.
    pub async fn set_account_domain(
        &self,
        id: i64,
        domain: &str,
        token: &str,
    ) -> Result<DbAccount, ResellerError> {
        sqlx::query(
            r#"UPDATE accounts SET
                custom_domain = ?,
                dns_verification_token = ?,
                domain_status = ?
              WHERE id = ?"#,
        )
        .bind(domain)
        .bind(token)
        .bind(DomainStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ResellerError::DomainInUse
            }
            other => other.into(),
        })?;
        self.get_account(id)
            .await?
            .ok_or(ResellerError::AccountNotFound)
    }

    pub async fn set_domain_status(
        &self,
        id: i64,
        status: DomainStatus,
    ) -> Result<(), ResellerError> {
        sqlx::query("UPDATE accounts SET domain_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_account_domain(&self, id: i64) -> Result<DbAccount, ResellerError> {
        sqlx::query(
            r#"UPDATE accounts SET
                custom_domain = NULL,
                dns_verification_token = NULL,
                domain_status = ?
              WHERE id = ?"#,
        )
        .bind(DomainStatus::Pending)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_account(id)
            .await?
            .ok_or(ResellerError::AccountNotFound)
    }

    pub async fn create_bucket(
        &self,
        account_id: i64,
        name: &str,
    ) -> Result<DbBucket, ResellerError> {
        let bucket = sqlx::query_as::<_, DbBucket>(
            "INSERT INTO buckets (account_id, name, created_at) VALUES (?, ?, ?) RETURNING id, account_id, name, created_at",
        )
        .bind(account_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ResellerError::Validation(format!("bucket '{name}' already exists"))
            }
            other => other.into(),
        })?;
        Ok(bucket)
    }

    pub async fn list_buckets(&self, account_id: i64) -> Result<Vec<DbBucket>, ResellerError> {
        let rows = sqlx::query_as::<_, DbBucket>(
            "SELECT id, account_id, name, created_at FROM buckets WHERE account_id = ? ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_sftp_credential(
        &self,
        account_id: i64,
    ) -> Result<Option<DbSftpCredential>, ResellerError> {
        let row = sqlx::query_as::<_, DbSftpCredential>(&format!(
            "SELECT {SFTP_COLUMNS} FROM sftp_credentials WHERE account_id = ?"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert the credential row for `account_id`. Losing a concurrent insert
    /// race surfaces as [`ResellerError::SftpCredentialsExist`].
    pub async fn insert_sftp_credential(
        &self,
        account_id: i64,
        username: &str,
        password_hash: &str,
    ) -> Result<DbSftpCredential, ResellerError> {
        let row = sqlx::query_as::<_, DbSftpCredential>(&format!(
            "INSERT INTO sftp_credentials (account_id, username, password_hash, status, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {SFTP_COLUMNS}"
        ))
        .bind(account_id)
        .bind(username)
        .bind(password_hash)
        .bind(SftpStatus::Active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() && db.message().contains("account_id") =>
            {
                ResellerError::SftpCredentialsExist
            }
            other => other.into(),
        })?;
        Ok(row)
    }

    pub async fn update_sftp_password_hash(
        &self,
        account_id: i64,
        password_hash: &str,
    ) -> Result<(), ResellerError> {
        sqlx::query("UPDATE sftp_credentials SET password_hash = ? WHERE account_id = ?")
            .bind(password_hash)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_sftp_status(
        &self,
        account_id: i64,
        status: SftpStatus,
    ) -> Result<(), ResellerError> {
        sqlx::query("UPDATE sftp_credentials SET status = ? WHERE account_id = ?")
            .bind(status)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_audit_log(
        &self,
        account_id: i64,
        action: &str,
        resource: &str,
        details: &Value,
    ) -> Result<i64, ResellerError> {
        let details = serde_json::to_string(details)?;
        let rec: (i64,) = sqlx::query_as(
            "INSERT INTO audit_logs (account_id, action, resource, details, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(account_id)
        .bind(action)
        .bind(resource)
        .bind(details)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.0)
    }

    /// Newest first.
    pub async fn list_audit_logs(&self, account_id: i64) -> Result<Vec<DbAuditLog>, ResellerError> {
        let rows = sqlx::query_as::<_, DbAuditLog>(
            r#"SELECT id, account_id, action, resource, details, created_at
               FROM audit_logs WHERE account_id = ? ORDER BY id DESC"#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
