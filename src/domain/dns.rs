//! DNS resolver abstraction for domain verification.
//!
//! Production uses hickory-resolver with the system configuration; tests
//! plug in their own [`DnsResolver`].

use async_trait::async_trait;
use hickory_resolver::{
    Resolver,
    config::ResolverConfig,
    name_server::TokioConnectionProvider,
    proto::rr::{RData, RecordType},
};
use std::time::Duration;
use thiserror::Error as ThisError;

/// A lookup that produced no usable answer. Always recoverable from the
/// verifier's point of view.
#[derive(Debug, Clone, ThisError)]
pub enum DnsLookupError {
    #[error("{0}")]
    Lookup(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Canonical names the domain is aliased to.
    async fn lookup_cname(&self, domain: &str) -> Result<Vec<String>, DnsLookupError>;

    /// TXT records for the domain, each record's character-strings joined.
    async fn lookup_txt(&self, domain: &str) -> Result<Vec<String>, DnsLookupError>;
}

pub struct HickoryDnsResolver {
    resolver: Resolver<TokioConnectionProvider>,
}

impl HickoryDnsResolver {
    /// Create a resolver with the default upstream configuration.
    pub fn new() -> Self {
        let resolver = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Self { resolver }
    }
}

impl Default for HickoryDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn lookup_cname(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        let lookup = self
            .resolver
            .lookup(domain, RecordType::CNAME)
            .await
            .map_err(|e| DnsLookupError::Lookup(e.to_string()))?;
        let names = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::CNAME(cname) => Some(cname.0.to_utf8()),
                _ => None,
            })
            .collect();
        Ok(names)
    }

    async fn lookup_txt(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        let lookup = self
            .resolver
            .txt_lookup(domain)
            .await
            .map_err(|e| DnsLookupError::Lookup(e.to_string()))?;
        let records = lookup
            .iter()
            .map(|txt| {
                txt.iter()
                    .map(|data| String::from_utf8_lossy(data).to_string())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .collect();
        Ok(records)
    }
}
