//! Runtime configuration.
//!
//! Values are layered with figment: built-in defaults, then `RESELLER_`
//! prefixed environment variables (`__` separates nested keys, e.g.
//! `RESELLER_SFTPGO__API_KEY`), then the plain variable names the deployment
//! scripts already export (`SFTPGO_API_KEY`, `MINIO_ENDPOINT`, ...).

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Plain environment variable names and the config key each one feeds.
const RAW_ENV_KEYS: &[(&str, &str)] = &[
    ("database_url", "basic.database_url"),
    ("sftpgo_api_url", "sftpgo.api_url"),
    ("sftpgo_api_key", "sftpgo.api_key"),
    ("minio_endpoint", "storage.endpoint"),
    ("minio_region", "storage.region"),
    ("minio_root_user", "storage.access_key"),
    ("minio_root_password", "storage.access_secret"),
    ("sftp_host", "sftp.host"),
    ("sftp_port", "sftp.port"),
    ("ftps_port", "sftp.ftps_port"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default)]
    pub domain: DomainConfig,
    #[serde(default)]
    pub sftpgo: SftpGoConfig,
    #[serde(default)]
    pub storage: StorageBackendConfig,
    #[serde(default)]
    pub sftp: SftpDisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Key required on every `/api` request.
    pub admin_key: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:reseller.sqlite".to_string(),
            loglevel: "info".to_string(),
            admin_key: "change-me".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Prefix of the TXT proof record, `<product_slug>-verification=<token>`.
    pub product_slug: String,
    /// Host a tenant domain must CNAME to.
    pub target_cname: String,
    pub dns_timeout_secs: u64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            product_slug: "primecloudpro".to_string(),
            target_cname: "app.primecloudpro.com.br".to_string(),
            dns_timeout_secs: 5,
        }
    }
}

impl DomainConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpGoConfig {
    pub api_url: Url,
    /// Missing key puts the gateway in mock mode.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for SftpGoConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:8080").expect("default SFTPGo url is valid"),
            api_key: None,
            request_timeout_secs: 5,
        }
    }
}

impl SftpGoConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// The configured key, treating an empty string as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// S3-compatible store behind every SFTP virtual folder. All tenants share
/// this identity; folders are separated by bucket name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBackendConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub upload_part_size: u32,
    pub upload_concurrency: u32,
}

impl Default for StorageBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            access_secret: String::new(),
            upload_part_size: 5,
            upload_concurrency: 4,
        }
    }
}

/// Connection details shown to tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpDisplayConfig {
    pub host: String,
    pub port: u16,
    pub ftps_port: u16,
}

impl Default for SftpDisplayConfig {
    fn default() -> Self {
        Self {
            host: "sftp.cloudstoragepro.com.br".to_string(),
            port: 2022,
            ftps_port: 2121,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("RESELLER_").split("__"))
            .merge(
                Env::raw()
                    .only(&RAW_ENV_KEYS.iter().map(|(k, _)| *k).collect::<Vec<_>>())
                    .map(|key| {
                        let lower = key.as_str().to_ascii_lowercase();
                        RAW_ENV_KEYS
                            .iter()
                            .find(|(raw, _)| *raw == lower)
                            .map(|(_, mapped)| (*mapped).into())
                            .unwrap_or_else(|| lower.into())
                    }),
            )
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_apply_without_environment() {
        Jail::expect_with(|_jail| {
            let cfg = Config::load()?;
            assert_eq!(cfg.sftp.host, "sftp.cloudstoragepro.com.br");
            assert_eq!(cfg.sftp.port, 2022);
            assert_eq!(cfg.sftp.ftps_port, 2121);
            assert_eq!(cfg.storage.region, "us-east-1");
            assert!(cfg.sftpgo.api_key().is_none());
            assert_eq!(cfg.domain.dns_timeout(), Duration::from_secs(5));
            Ok(())
        });
    }

    #[test]
    fn deployment_variable_names_are_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("SFTPGO_API_URL", "http://sftpgo:8080");
            jail.set_env("SFTPGO_API_KEY", "secret");
            jail.set_env("MINIO_ROOT_USER", "minio");
            jail.set_env("SFTP_PORT", "22");

            let cfg = Config::load()?;
            assert_eq!(cfg.sftpgo.api_url.as_str(), "http://sftpgo:8080/");
            assert_eq!(cfg.sftpgo.api_key(), Some("secret"));
            assert_eq!(cfg.storage.access_key, "minio");
            assert_eq!(cfg.sftp.port, 22);
            Ok(())
        });
    }

    #[test]
    fn prefixed_variables_override_nested_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("RESELLER_BASIC__ADMIN_KEY", "k1");
            jail.set_env("RESELLER_DOMAIN__TARGET_CNAME", "edge.example.net");

            let cfg = Config::load()?;
            assert_eq!(cfg.basic.admin_key, "k1");
            assert_eq!(cfg.domain.target_cname, "edge.example.net");
            Ok(())
        });
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let cfg = SftpGoConfig {
            api_key: Some("  ".to_string()),
            ..SftpGoConfig::default()
        };
        assert!(cfg.api_key().is_none());
    }
}
