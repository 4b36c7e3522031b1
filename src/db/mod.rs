//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `Storage` handle with every query the services need

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{
    AccountDomain, AccountView, DbAccount, DbAuditLog, DbBucket, DbSftpCredential, DomainStatus, SftpStatus,
};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, Storage};
