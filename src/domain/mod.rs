//! Custom-domain ownership: input validation, verification tokens and the
//! CNAME-then-TXT DNS check.

pub mod dns;
pub mod validate;
pub mod verify;

pub use dns::{DnsLookupError, DnsResolver, HickoryDnsResolver};
pub use validate::{generate_verification_token, is_domain_unique, is_valid_domain, normalize_domain};
pub use verify::{DomainInstructions, DomainVerificationResult, DomainVerifier, RecordKind};
