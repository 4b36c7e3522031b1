use crate::db::AccountDomain;
use std::net::IpAddr;

const MAX_LABEL_LEN: usize = 63;
const MAX_DOMAIN_LEN: usize = 253;

/// 32 random bytes from the thread-local CSPRNG, hex-encoded (64 chars).
pub fn generate_verification_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Lowercase, drop a leading `http://`/`https://` and one trailing `/`.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme
        .strip_suffix('/')
        .unwrap_or(without_scheme)
        .to_string()
}

/// Conservative hostname check applied after [`normalize_domain`].
pub fn is_valid_domain(domain: &str) -> bool {
    let clean = normalize_domain(domain);
    if clean.is_empty() || clean.len() > MAX_DOMAIN_LEN || clean.parse::<IpAddr>().is_ok() {
        return false;
    }

    let labels: Vec<&str> = clean.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    if rest.is_empty() || !rest.iter().all(|label| is_valid_label(label)) {
        return false;
    }

    is_valid_label(tld) && tld.len() >= 2 && !tld.bytes().all(|b| b.is_ascii_digit())
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// False iff an account other than `current_account_id` already claims the
/// same normalized domain.
pub fn is_domain_unique(
    domain: &str,
    accounts: &[AccountDomain],
    current_account_id: Option<i64>,
) -> bool {
    let clean = normalize_domain(domain);
    !accounts
        .iter()
        .filter(|account| Some(account.id) != current_account_id)
        .any(|account| {
            account
                .custom_domain
                .as_deref()
                .is_some_and(|existing| existing.to_ascii_lowercase() == clean)
        })
}
