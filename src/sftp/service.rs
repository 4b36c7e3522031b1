use crate::config::{SftpDisplayConfig, StorageBackendConfig};
use crate::db::{DbSftpCredential, SftpStatus, Storage};
use crate::error::ResellerError;
use crate::sftp::gateway::{CredentialGateway, GatewayMode};
use crate::sftp::types::{SftpGoUser, UserPatch, VirtualFolder};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

pub const PASSWORD_LEN: usize = 16;

/// No `0 O o 1 l I`, so a password can be read aloud or copied by hand.
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789!@#$%&*";

const USERNAME_SLUG_LEN: usize = 10;

/// Returned once, right after create; the password is not stored anywhere.
#[derive(Clone, Serialize)]
pub struct ProvisionedSftpUser {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProvisionedSftpUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedSftpUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What callers may read back about a credential.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SftpCredentialView {
    pub account_id: i64,
    pub username: String,
    pub status: SftpStatus,
    pub created_at: DateTime<Utc>,
}

impl From<DbSftpCredential> for SftpCredentialView {
    fn from(row: DbSftpCredential) -> Self {
        Self {
            account_id: row.account_id,
            username: row.username,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SftpConnectionInfo {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub ftps_port: u16,
}

/// Issues, rotates and revokes per-account SFTP identities.
pub struct SftpProvisioner {
    storage: Storage,
    gateway: Arc<dyn CredentialGateway>,
    backend: StorageBackendConfig,
    display: SftpDisplayConfig,
}

impl SftpProvisioner {
    pub fn new(
        storage: Storage,
        gateway: Arc<dyn CredentialGateway>,
        backend: StorageBackendConfig,
        display: SftpDisplayConfig,
    ) -> Self {
        Self {
            storage,
            gateway,
            backend,
            display,
        }
    }

    pub fn gateway_mode(&self) -> GatewayMode {
        self.gateway.mode()
    }

    pub fn connection_info(&self) -> SftpConnectionInfo {
        SftpConnectionInfo {
            host: self.display.host.clone(),
            port: self.display.port,
            protocol: "SFTP".to_string(),
            ftps_port: self.display.ftps_port,
        }
    }

    pub async fn credential(
        &self,
        account_id: i64,
    ) -> Result<Option<SftpCredentialView>, ResellerError> {
        Ok(self
            .storage
            .get_sftp_credential(account_id)
            .await?
            .map(Into::into))
    }

    /// Create the account's SFTP identity. Not idempotent: a second call
    /// fails, use [`Self::reset_password`] to rotate instead.
    pub async fn create_user(&self, account_id: i64) -> Result<ProvisionedSftpUser, ResellerError> {
        self.try_create_user(account_id).await.inspect_err(|e| {
            warn!(account_id, error = %e, "failed to create SFTP user");
        })
    }

    async fn try_create_user(&self, account_id: i64) -> Result<ProvisionedSftpUser, ResellerError> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or(ResellerError::AccountNotFound)?;

        if self.storage.get_sftp_credential(account_id).await?.is_some() {
            return Err(ResellerError::SftpCredentialsExist);
        }

        let username = generate_username(account_id, account.slug.as_deref());
        let password = generate_password();

        let folders = self
            .storage
            .list_buckets(account_id)
            .await?
            .iter()
            .map(|bucket| VirtualFolder::for_bucket(account_id, &bucket.name, &self.backend))
            .collect();
        let user = SftpGoUser::provision(&username, &password, folders, &self.backend);

        self.gateway.create_user(&user).await?;
        self.storage
            .insert_sftp_credential(account_id, &username, &hash_password(&password))
            .await?;

        info!(account_id, username = %username, "SFTP user created");
        Ok(ProvisionedSftpUser { username, password })
    }

    /// Rotate the password. A live gateway that rejects the change leaves
    /// the stored hash untouched.
    pub async fn reset_password(&self, account_id: i64) -> Result<String, ResellerError> {
        self.try_reset_password(account_id).await.inspect_err(|e| {
            warn!(account_id, error = %e, "failed to reset SFTP password");
        })
    }

    async fn try_reset_password(&self, account_id: i64) -> Result<String, ResellerError> {
        let credential = self
            .storage
            .get_sftp_credential(account_id)
            .await?
            .ok_or(ResellerError::SftpCredentialsNotFound)?;

        let password = generate_password();
        if let Err(e) = self
            .gateway
            .update_user(&credential.username, &UserPatch::password(&password))
            .await
        {
            if self.gateway.mode() == GatewayMode::Live {
                return Err(e.into());
            }
            warn!(account_id, error = %e, "gateway rejected password change in mock mode");
        }

        self.storage
            .update_sftp_password_hash(account_id, &hash_password(&password))
            .await?;

        info!(account_id, "SFTP password reset");
        Ok(password)
    }

    /// Expose a newly created bucket to the account's SFTP user. Accounts
    /// without SFTP access are left alone.
    pub async fn add_bucket(&self, account_id: i64, bucket_name: &str) -> Result<(), ResellerError> {
        self.try_add_bucket(account_id, bucket_name)
            .await
            .inspect_err(|e| {
                warn!(account_id, bucket = %bucket_name, error = %e, "failed to add bucket to SFTP user");
            })
    }

    async fn try_add_bucket(&self, account_id: i64, bucket_name: &str) -> Result<(), ResellerError> {
        let Some(credential) = self.storage.get_sftp_credential(account_id).await? else {
            return Ok(());
        };

        let folder = VirtualFolder::for_bucket(account_id, bucket_name, &self.backend);
        self.gateway
            .add_virtual_folder(&credential.username, folder)
            .await?;

        info!(
            account_id,
            bucket = %bucket_name,
            username = %credential.username,
            "bucket added to SFTP user"
        );
        Ok(())
    }

    /// Revoke SFTP access. The local row is marked revoked even when the
    /// gateway call fails.
    pub async fn disable_user(&self, account_id: i64) -> Result<(), ResellerError> {
        self.try_disable_user(account_id).await.inspect_err(|e| {
            warn!(account_id, error = %e, "failed to disable SFTP user");
        })
    }

    async fn try_disable_user(&self, account_id: i64) -> Result<(), ResellerError> {
        let credential = self
            .storage
            .get_sftp_credential(account_id)
            .await?
            .ok_or(ResellerError::SftpCredentialsNotFound)?;

        // TODO: queue a retry of the gateway disable so provider-side access
        // catches up with the local revoke.
        if let Err(e) = self
            .gateway
            .update_user(&credential.username, &UserPatch::disable())
            .await
        {
            warn!(
                account_id,
                username = %credential.username,
                error = %e,
                "gateway disable failed, revoking locally anyway"
            );
        }

        self.storage
            .set_sftp_status(account_id, SftpStatus::Revoked)
            .await?;

        info!(account_id, "SFTP access disabled");
        Ok(())
    }
}

/// `sftp_<slug or id>_<4 hex>`; the slug keeps only `[a-z0-9]`, at most 10.
pub fn generate_username(account_id: i64, slug: Option<&str>) -> String {
    let slug_part: String = slug
        .unwrap_or_default()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(USERNAME_SLUG_LEN)
        .collect();
    let prefix = if slug_part.is_empty() {
        account_id.to_string()
    } else {
        slug_part
    };
    format!("sftp_{prefix}_{}", hex::encode(rand::random::<[u8; 2]>()))
}

pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .map(|_| char::from(PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())]))
        .collect()
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::gateway::{GatewayError, LoggingStubGateway};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call; optionally fails all of them.
    struct RecordingGateway {
        mode: GatewayMode,
        fail: bool,
        created: Mutex<Vec<SftpGoUser>>,
        updates: Mutex<Vec<(String, UserPatch)>>,
        folders: Mutex<Vec<(String, VirtualFolder)>>,
    }

    impl RecordingGateway {
        fn new(mode: GatewayMode, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                mode,
                fail,
                created: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
                folders: Mutex::new(Vec::new()),
            })
        }

        fn outcome(&self) -> Result<(), GatewayError> {
            if self.fail {
                Err(GatewayError::Status {
                    status: 503,
                    body: "sftpgo down".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CredentialGateway for RecordingGateway {
        fn mode(&self) -> GatewayMode {
            self.mode
        }

        async fn create_user(&self, user: &SftpGoUser) -> Result<(), GatewayError> {
            self.created.lock().unwrap().push(user.clone());
            self.outcome()
        }

        async fn update_user(&self, username: &str, patch: &UserPatch) -> Result<(), GatewayError> {
            self.updates
                .lock()
                .unwrap()
                .push((username.to_string(), patch.clone()));
            self.outcome()
        }

        async fn add_virtual_folder(
            &self,
            username: &str,
            folder: VirtualFolder,
        ) -> Result<(), GatewayError> {
            self.folders
                .lock()
                .unwrap()
                .push((username.to_string(), folder));
            self.outcome()
        }
    }

    async fn setup(gateway: Arc<dyn CredentialGateway>) -> (Storage, SftpProvisioner) {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let provisioner = SftpProvisioner::new(
            storage.clone(),
            gateway,
            StorageBackendConfig::default(),
            SftpDisplayConfig::default(),
        );
        (storage, provisioner)
    }

    #[test]
    fn username_uses_sanitized_slug_or_id() {
        let name = generate_username(42, Some("Acme Corp-Brasil!"));
        assert!(name.starts_with("sftp_acmecorpbr_"), "{name}");
        assert_eq!(name.len(), "sftp_acmecorpbr_".len() + 4);

        let name = generate_username(42, None);
        assert!(name.starts_with("sftp_42_"), "{name}");

        let name = generate_username(7, Some("---"));
        assert!(name.starts_with("sftp_7_"), "{name}");
    }

    #[test]
    fn passwords_avoid_ambiguous_characters() {
        for _ in 0..200 {
            let pw = generate_password();
            assert_eq!(pw.chars().count(), PASSWORD_LEN);
            assert!(!pw.contains(['0', 'O', 'o', '1', 'l', 'I']), "{pw}");
        }
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn create_then_duplicate_fails() {
        let gateway = RecordingGateway::new(GatewayMode::Live, false);
        let (storage, sftp) = setup(gateway.clone()).await;
        let account = storage.create_account("Acme", Some("acme")).await.unwrap();
        storage.create_bucket(account.id, "photos").await.unwrap();

        let created = sftp.create_user(account.id).await.unwrap();
        assert!(created.username.starts_with("sftp_acme_"));
        assert_eq!(created.password.len(), PASSWORD_LEN);

        {
            let sent = gateway.created.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].virtual_folders.len(), 1);
            assert_eq!(
                sent[0].virtual_folders[0]
                    .filesystem
                    .s3config
                    .as_ref()
                    .unwrap()
                    .bucket,
                format!("tenant-{}-photos", account.id)
            );
            assert_eq!(sent[0].permissions["/"].len(), 6);
        }

        let err = sftp.create_user(account.id).await.unwrap_err();
        assert!(err.to_string().contains("already exist"));
        assert_eq!(gateway.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_for_missing_account() {
        let (_storage, sftp) = setup(Arc::new(LoggingStubGateway)).await;
        let err = sftp.create_user(999).await.unwrap_err();
        assert_eq!(err.to_string(), "Account not found");
    }

    #[tokio::test]
    async fn gateway_failure_on_create_persists_nothing() {
        let gateway = RecordingGateway::new(GatewayMode::Live, true);
        let (storage, sftp) = setup(gateway).await;
        let account = storage.create_account("Acme", None).await.unwrap();

        let err = sftp.create_user(account.id).await.unwrap_err();
        assert_eq!(err.to_string(), "sftpgo down");
        assert!(storage.get_sftp_credential(account.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_the_hash_is_persisted() {
        let (storage, sftp) = setup(Arc::new(LoggingStubGateway)).await;
        let account = storage.create_account("Acme", None).await.unwrap();

        let created = sftp.create_user(account.id).await.unwrap();
        let row = storage
            .get_sftp_credential(account.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(row.password_hash, created.password);
        assert_ne!(row.username, created.password);
        assert_eq!(row.password_hash, hash_password(&created.password));
        assert_eq!(row.status, SftpStatus::Active);

        let view = sftp.credential(account.id).await.unwrap().unwrap();
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains(&created.password));
        assert!(!json.contains(&row.password_hash));
        assert!(!format!("{created:?}").contains(&created.password));
    }

    #[tokio::test]
    async fn reset_rotates_hash_and_keeps_username() {
        let gateway = RecordingGateway::new(GatewayMode::Live, false);
        let (storage, sftp) = setup(gateway.clone()).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        let created = sftp.create_user(account.id).await.unwrap();

        let password = sftp.reset_password(account.id).await.unwrap();
        let row = storage
            .get_sftp_credential(account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.username, created.username);
        assert_eq!(row.password_hash, hash_password(&password));

        let updates = gateway.updates.lock().unwrap();
        assert_eq!(updates[0].0, created.username);
        assert_eq!(updates[0].1.password.as_deref(), Some(password.as_str()));
    }

    #[tokio::test]
    async fn reset_without_credential() {
        let (storage, sftp) = setup(Arc::new(LoggingStubGateway)).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        let err = sftp.reset_password(account.id).await.unwrap_err();
        assert_eq!(err.to_string(), "SFTP credentials not found");
    }

    #[tokio::test]
    async fn live_reset_failure_leaves_hash_untouched() {
        let gateway = RecordingGateway::new(GatewayMode::Live, true);
        let (storage, sftp) = setup(gateway).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        storage
            .insert_sftp_credential(account.id, "sftp_1_abcd", "original")
            .await
            .unwrap();

        assert!(sftp.reset_password(account.id).await.is_err());
        let row = storage
            .get_sftp_credential(account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.password_hash, "original");
    }

    #[tokio::test]
    async fn mock_reset_failure_still_updates_hash() {
        let gateway = RecordingGateway::new(GatewayMode::Mock, true);
        let (storage, sftp) = setup(gateway).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        storage
            .insert_sftp_credential(account.id, "sftp_1_abcd", "original")
            .await
            .unwrap();

        let password = sftp.reset_password(account.id).await.unwrap();
        let row = storage
            .get_sftp_credential(account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.password_hash, hash_password(&password));
    }

    #[tokio::test]
    async fn add_bucket_without_credential_is_noop() {
        let gateway = RecordingGateway::new(GatewayMode::Live, false);
        let (storage, sftp) = setup(gateway.clone()).await;
        let account = storage.create_account("Acme", None).await.unwrap();

        sftp.add_bucket(account.id, "photos").await.unwrap();
        assert!(gateway.folders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_bucket_forwards_folder() {
        let gateway = RecordingGateway::new(GatewayMode::Live, false);
        let (storage, sftp) = setup(gateway.clone()).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        let created = sftp.create_user(account.id).await.unwrap();

        sftp.add_bucket(account.id, "videos").await.unwrap();
        let folders = gateway.folders.lock().unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].0, created.username);
        assert_eq!(folders[0].1.virtual_path, "/videos");
    }

    #[tokio::test]
    async fn add_bucket_surfaces_gateway_failure() {
        let gateway = RecordingGateway::new(GatewayMode::Live, true);
        let (storage, sftp) = setup(gateway).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        storage
            .insert_sftp_credential(account.id, "sftp_1_abcd", "h")
            .await
            .unwrap();

        assert!(sftp.add_bucket(account.id, "videos").await.is_err());
    }

    #[tokio::test]
    async fn disable_revokes_locally_even_when_gateway_fails() {
        let gateway = RecordingGateway::new(GatewayMode::Live, true);
        let (storage, sftp) = setup(gateway.clone()).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        storage
            .insert_sftp_credential(account.id, "sftp_1_abcd", "h")
            .await
            .unwrap();

        sftp.disable_user(account.id).await.unwrap();
        let row = storage
            .get_sftp_credential(account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, SftpStatus::Revoked);
        assert_eq!(
            gateway.updates.lock().unwrap()[0].1,
            UserPatch::disable()
        );
    }

    #[tokio::test]
    async fn disable_without_credential() {
        let (storage, sftp) = setup(Arc::new(LoggingStubGateway)).await;
        let account = storage.create_account("Acme", None).await.unwrap();
        let err = sftp.disable_user(account.id).await.unwrap_err();
        assert_eq!(err.to_string(), "SFTP credentials not found");
    }

    #[tokio::test]
    async fn connection_info_uses_display_config() {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        let display = SftpDisplayConfig {
            host: "sftp.example.com".to_string(),
            port: 22,
            ftps_port: 990,
        };
        let sftp = SftpProvisioner::new(
            storage,
            Arc::new(LoggingStubGateway),
            StorageBackendConfig::default(),
            display,
        );

        let info = sftp.connection_info();
        assert_eq!(info.host, "sftp.example.com");
        assert_eq!(info.port, 22);
        assert_eq!(info.protocol, "SFTP");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["ftpsPort"], 990);
        assert_eq!(sftp.gateway_mode(), GatewayMode::Mock);
    }
}
