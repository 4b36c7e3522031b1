//! SFTP/FTPS identity provisioning against SFTPGo.
//!
//! Layout:
//! - `types.rs`: SFTPGo wire shapes (users, filesystems, virtual folders)
//! - `gateway.rs`: the `CredentialGateway` seam with live and mock backends
//! - `service.rs`: `SftpProvisioner`, the operations the HTTP layer calls

pub mod gateway;
pub mod service;
pub mod types;

pub use gateway::{
    CredentialGateway, GatewayError, GatewayMode, LiveGateway, LoggingStubGateway, connect_gateway,
};
pub use service::{ProvisionedSftpUser, SftpConnectionInfo, SftpCredentialView, SftpProvisioner};
pub use types::{SftpGoUser, UserPatch, VirtualFolder};
