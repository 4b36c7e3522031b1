use crate::config::DomainConfig;
use crate::domain::dns::{DnsLookupError, DnsResolver};
use crate::domain::validate::{is_valid_domain, normalize_domain};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    Cname,
    Txt,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainVerificationResult {
    pub verified: bool,
    pub record_type: Option<RecordKind>,
    pub message: String,
}

impl DomainVerificationResult {
    fn verified(record_type: RecordKind, message: String) -> Self {
        Self {
            verified: true,
            record_type: Some(record_type),
            message,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            verified: false,
            record_type: None,
            message,
        }
    }
}

/// DNS changes an operator can make to prove ownership.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DomainInstructions {
    pub cname: String,
    pub txt: String,
}

/// Decides whether an account controls a domain, preferring a CNAME onto the
/// product host and falling back to a TXT proof record.
pub struct DomainVerifier {
    resolver: Arc<dyn DnsResolver>,
    product_slug: String,
    target_cname: String,
    lookup_timeout: Duration,
}

impl DomainVerifier {
    pub fn new(resolver: Arc<dyn DnsResolver>, config: &DomainConfig) -> Self {
        Self {
            resolver,
            product_slug: config.product_slug.clone(),
            target_cname: config.target_cname.clone(),
            lookup_timeout: config.dns_timeout(),
        }
    }

    /// The exact string that must appear in a TXT record.
    pub fn verification_record(&self, token: &str) -> String {
        format!("{}-verification={}", self.product_slug, token)
    }

    pub fn instructions(&self, domain: &str, token: &str) -> DomainInstructions {
        let clean = normalize_domain(domain);
        DomainInstructions {
            cname: format!(
                "Add a CNAME record pointing {clean} to {}",
                self.target_cname
            ),
            txt: format!(
                "Or add a TXT record with: {}",
                self.verification_record(token)
            ),
        }
    }

    pub async fn verify_ownership(&self, domain: &str, token: &str) -> DomainVerificationResult {
        self.verify_ownership_with_target(domain, token, &self.target_cname)
            .await
    }

    pub async fn verify_ownership_with_target(
        &self,
        domain: &str,
        token: &str,
        target_cname: &str,
    ) -> DomainVerificationResult {
        let clean = normalize_domain(domain);
        if !is_valid_domain(&clean) {
            warn!(domain = %domain, "refusing to resolve malformed domain");
            return DomainVerificationResult::failed(format!(
                "DNS verification failed: '{clean}' is not a valid domain name"
            ));
        }

        let target = target_cname.to_ascii_lowercase();
        match self.bounded(self.resolver.lookup_cname(&clean)).await {
            Ok(names) => {
                if let Some(name) = names
                    .iter()
                    .find(|name| name.to_ascii_lowercase().contains(&target))
                {
                    info!(domain = %clean, cname = %name, "domain verified by CNAME");
                    return DomainVerificationResult::verified(
                        RecordKind::Cname,
                        format!("CNAME record verified. {clean} points to {name}"),
                    );
                }
                debug!(domain = %clean, found = ?names, "CNAME does not point at target, trying TXT");
            }
            Err(e) => {
                debug!(domain = %clean, error = %e, "CNAME lookup failed, trying TXT");
            }
        }

        let expected = self.verification_record(token);
        match self.bounded(self.resolver.lookup_txt(&clean)).await {
            Ok(records) if records.iter().any(|r| r.contains(&expected)) => {
                info!(domain = %clean, "domain verified by TXT");
                DomainVerificationResult::verified(
                    RecordKind::Txt,
                    "TXT record verified. Verification token found.".to_string(),
                )
            }
            Ok(records) if !records.is_empty() => DomainVerificationResult::failed(format!(
                "TXT record found but does not contain the verification token. Add: {expected}"
            )),
            Ok(_) | Err(_) => DomainVerificationResult::failed(format!(
                "No valid DNS records found. Please configure either:\n\
                 1. CNAME record pointing to {target_cname}\n\
                 2. TXT record with: {expected}"
            )),
        }
    }

    async fn bounded<F>(&self, lookup: F) -> Result<Vec<String>, DnsLookupError>
    where
        F: Future<Output = Result<Vec<String>, DnsLookupError>>,
    {
        tokio::time::timeout(self.lookup_timeout, lookup)
            .await
            .unwrap_or(Err(DnsLookupError::Timeout(self.lookup_timeout)))
    }
}
