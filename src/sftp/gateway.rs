use crate::config::SftpGoConfig;
use crate::sftp::types::{SftpGoUser, UserPatch, VirtualFolder};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{info, warn};

const API_KEY_HEADER: &str = "x-sftpgo-api-key";
const STATUS_PATH: &str = "/api/v2/status";
const USERS_PATH: &str = "/api/v2/users";

#[derive(Debug, ThisError)]
pub enum GatewayError {
    #[error("SFTPGo request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx answer; the message is the body SFTPGo sent back.
    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("SFTPGo payload could not be encoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SFTPGo API key is not a valid header value")]
    InvalidApiKey(#[from] InvalidHeaderValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Live,
    Mock,
}

/// Where SFTP identities actually live. Chosen once at startup by
/// [`connect_gateway`].
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    fn mode(&self) -> GatewayMode;

    async fn create_user(&self, user: &SftpGoUser) -> Result<(), GatewayError>;

    async fn update_user(&self, username: &str, patch: &UserPatch) -> Result<(), GatewayError>;

    /// Append `folder` to the user's existing virtual folders.
    async fn add_virtual_folder(
        &self,
        username: &str,
        folder: VirtualFolder,
    ) -> Result<(), GatewayError>;
}

/// Probe SFTPGo once and pick the backend for the lifetime of the process.
///
/// No API key, a client that cannot be built, or a failed status probe all
/// yield the [`LoggingStubGateway`]. Nothing re-probes later; a new gateway
/// has to be constructed to pick up a recovered SFTPGo.
pub async fn connect_gateway(cfg: &SftpGoConfig) -> Arc<dyn CredentialGateway> {
    let Some(api_key) = cfg.api_key() else {
        warn!("SFTPGo API key not set, running in mock mode");
        return Arc::new(LoggingStubGateway);
    };

    let live = match LiveGateway::new(cfg.api_url.as_str(), api_key, cfg.request_timeout()) {
        Ok(live) => live,
        Err(e) => {
            warn!(error = %e, "cannot build SFTPGo client, running in mock mode");
            return Arc::new(LoggingStubGateway);
        }
    };

    match live.check_status().await {
        Ok(()) => {
            info!(url = %cfg.api_url, "SFTPGo connection verified");
            Arc::new(live)
        }
        Err(e) => {
            warn!(url = %cfg.api_url, error = %e, "SFTPGo not available, running in mock mode");
            Arc::new(LoggingStubGateway)
        }
    }
}

/// Talks to a reachable SFTPGo admin API.
#[derive(Clone)]
pub struct LiveGateway {
    client: reqwest::Client,
    base_url: String,
}

impl LiveGateway {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, GatewayError> {
        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn user_url(&self, username: &str) -> String {
        self.url(&format!("{USERS_PATH}/{username}"))
    }

    pub async fn check_status(&self) -> Result<(), GatewayError> {
        let resp = self.client.get(self.url(STATUS_PATH)).send().await?;
        ensure_success(resp).await.map(|_| ())
    }

    /// The user record exactly as SFTPGo returns it.
    pub async fn get_user(&self, username: &str) -> Result<Value, GatewayError> {
        let resp = self.client.get(self.user_url(username)).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CredentialGateway for LiveGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Live
    }

    async fn create_user(&self, user: &SftpGoUser) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.url(USERS_PATH))
            .json(user)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn update_user(&self, username: &str, patch: &UserPatch) -> Result<(), GatewayError> {
        let resp = self
            .client
            .put(self.user_url(username))
            .json(patch)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn add_virtual_folder(
        &self,
        username: &str,
        folder: VirtualFolder,
    ) -> Result<(), GatewayError> {
        let mut user = self.get_user(username).await?;
        let mut folders = match user.get_mut("virtual_folders").map(Value::take) {
            Some(Value::Array(existing)) => existing,
            _ => Vec::new(),
        };
        folders.push(serde_json::to_value(folder)?);
        self.update_user(username, &UserPatch::folders(folders))
            .await
    }
}

/// Mock mode: every call succeeds without leaving the process. Each call is
/// logged with a `[MOCK]` prefix so nobody mistakes it for a real mutation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStubGateway;

#[async_trait]
impl CredentialGateway for LoggingStubGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Mock
    }

    async fn create_user(&self, user: &SftpGoUser) -> Result<(), GatewayError> {
        info!(
            username = %user.username,
            folders = user.virtual_folders.len(),
            "[MOCK] SFTPGo POST {USERS_PATH}"
        );
        Ok(())
    }

    async fn update_user(&self, username: &str, patch: &UserPatch) -> Result<(), GatewayError> {
        info!(
            password_changed = patch.password.is_some(),
            status = ?patch.status,
            folders = ?patch.virtual_folders.as_ref().map(Vec::len),
            "[MOCK] SFTPGo PUT {USERS_PATH}/{username}"
        );
        Ok(())
    }

    async fn add_virtual_folder(
        &self,
        username: &str,
        folder: VirtualFolder,
    ) -> Result<(), GatewayError> {
        info!(
            "[MOCK] Adding bucket {} to SFTP user {}",
            folder.name, username
        );
        Ok(())
    }
}
