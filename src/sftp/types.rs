use crate::config::StorageBackendConfig;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// SFTPGo `filesystem.provider` value for S3-compatible storage.
pub const PROVIDER_S3: u8 = 1;
pub const USER_ENABLED: u8 = 1;
pub const USER_DISABLED: u8 = 0;

/// Every permission granted at the user's root.
pub const FULL_PERMISSIONS: [&str; 6] = [
    "list",
    "download",
    "upload",
    "create_dirs",
    "rename",
    "delete",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SftpGoUser {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub status: u8,
    pub home_dir: String,
    pub permissions: HashMap<String, Vec<String>>,
    pub filesystem: Filesystem,
    pub virtual_folders: Vec<VirtualFolder>,
}

impl SftpGoUser {
    /// An enabled user rooted on the shared backend, with one folder per
    /// bucket the account already owns.
    pub fn provision(
        username: &str,
        password: &str,
        folders: Vec<VirtualFolder>,
        backend: &StorageBackendConfig,
    ) -> Self {
        let permissions = HashMap::from([(
            "/".to_string(),
            FULL_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
        )]);
        Self {
            username: username.to_string(),
            password: Some(password.to_string()),
            status: USER_ENABLED,
            home_dir: format!("/home/{username}"),
            permissions,
            filesystem: Filesystem::s3(String::new(), backend),
            virtual_folders: folders,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Filesystem {
    pub provider: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3config: Option<S3Config>,
}

impl Filesystem {
    pub fn s3(bucket: String, backend: &StorageBackendConfig) -> Self {
        Self {
            provider: PROVIDER_S3,
            s3config: Some(S3Config {
                bucket,
                region: backend.region.clone(),
                access_key: backend.access_key.clone(),
                access_secret: backend.access_secret.clone(),
                endpoint: backend.endpoint.clone(),
                upload_part_size: backend.upload_part_size,
                upload_concurrency: backend.upload_concurrency,
            }),
        }
    }
}

#[derive(Clone, Serialize, PartialEq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub endpoint: String,
    pub upload_part_size: u32,
    pub upload_concurrency: u32,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VirtualFolder {
    pub name: String,
    pub mapped_path: String,
    pub virtual_path: String,
    pub filesystem: Filesystem,
}

impl VirtualFolder {
    /// `/<bucket>` in the SFTP tree, backed by `tenant-<account>-<bucket>`.
    pub fn for_bucket(account_id: i64, bucket: &str, backend: &StorageBackendConfig) -> Self {
        Self {
            name: bucket.to_string(),
            mapped_path: format!("/{bucket}"),
            virtual_path: format!("/{bucket}"),
            filesystem: Filesystem::s3(format!("tenant-{account_id}-{bucket}"), backend),
        }
    }
}

/// Partial body for `PUT /api/v2/users/{username}`.
///
/// Folders are raw JSON: the list SFTPGo already holds is sent back exactly
/// as it was read, secrets and unmodelled fields included.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_folders: Option<Vec<Value>>,
}

impl UserPatch {
    pub fn password(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..Self::default()
        }
    }

    pub fn disable() -> Self {
        Self {
            status: Some(USER_DISABLED),
            ..Self::default()
        }
    }

    pub fn folders(virtual_folders: Vec<Value>) -> Self {
        Self {
            virtual_folders: Some(virtual_folders),
            ..Self::default()
        }
    }
}
