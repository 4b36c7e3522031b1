pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod sftp;

pub use error::ResellerError;
