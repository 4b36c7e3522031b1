use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use reseller_ctl::config::{DomainConfig, SftpDisplayConfig, StorageBackendConfig};
use reseller_ctl::db::Storage;
use reseller_ctl::domain::{DnsLookupError, DnsResolver, DomainVerifier};
use reseller_ctl::router::{AppState, reseller_router};
use reseller_ctl::sftp::{LoggingStubGateway, SftpProvisioner};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const KEY: &str = "test-admin-key";

/// TXT records can be published mid-test; CNAME lookups always fail.
#[derive(Default)]
struct PublishedTxt {
    records: Mutex<Vec<String>>,
}

#[async_trait]
impl DnsResolver for PublishedTxt {
    async fn lookup_cname(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        Err(DnsLookupError::Lookup(format!("no CNAME for {domain}")))
    }

    async fn lookup_txt(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        let records = self.records.lock().expect("dns mutex poisoned").clone();
        if records.is_empty() {
            return Err(DnsLookupError::Lookup(format!("no TXT for {domain}")));
        }
        Ok(records)
    }
}

async fn app(dns: Arc<PublishedTxt>) -> Router {
    let storage = Storage::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let verifier = DomainVerifier::new(dns, &DomainConfig::default());
    let provisioner = SftpProvisioner::new(
        storage.clone(),
        Arc::new(LoggingStubGateway),
        StorageBackendConfig::default(),
        SftpDisplayConfig::default(),
    );
    reseller_router(AppState::new(storage, verifier, provisioner, KEY))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", KEY);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).expect("failed to build request"))
        .await
        .expect("request failed");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body was not json")
    };
    (status, value)
}

async fn create_account(app: &Router, name: &str, slug: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/accounts",
        Some(json!({"name": name, "slug": slug})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().expect("account id")
}

#[tokio::test]
async fn api_requires_admin_key() {
    let app = app(Arc::default()).await;
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/sftp/connection-info")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/api/sftp/connection-info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port"], 2022);
    assert_eq!(body["ftpsPort"], 2121);
}

#[tokio::test]
async fn domain_configuration_and_txt_verification() {
    let dns = Arc::new(PublishedTxt::default());
    let app = app(dns.clone()).await;
    let acme = create_account(&app, "Acme", "acme").await;
    let other = create_account(&app, "Other", "other").await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/accounts/{acme}/domain"),
        Some(json!({"customDomain": "not a domain"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/accounts/{acme}/domain"),
        Some(json!({"customDomain": "https://Files.Acme.com/"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["customDomain"], "files.acme.com");
    assert_eq!(body["account"]["domainStatus"], "pending");
    assert_eq!(body["account"]["domainVerified"], false);
    assert!(body["account"].get("dnsVerificationToken").is_none());
    let token = body["verificationToken"].as_str().expect("token").to_string();
    assert_eq!(token.len(), 64);
    assert!(
        body["instructions"]["txt"]
            .as_str()
            .expect("txt instructions")
            .contains(&token)
    );

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/accounts/{other}/domain"),
        Some(json!({"customDomain": "FILES.acme.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/accounts/{acme}/domain/verify"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], false);
    assert_eq!(body["status"], "failed");
    assert!(body["recordType"].is_null());

    dns.records
        .lock()
        .expect("dns mutex poisoned")
        .push(format!("primecloudpro-verification={token}"));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/accounts/{acme}/domain/verify"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["status"], "active");
    assert_eq!(body["recordType"], "TXT");

    let (status, body) = send(&app, "DELETE", &format!("/api/accounts/{acme}/domain"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["account"]["customDomain"].is_null());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/accounts/{acme}/domain/verify"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, logs) = send(&app, "GET", &format!("/api/accounts/{acme}/audit-logs"), None).await;
    let actions: Vec<&str> = logs
        .as_array()
        .expect("audit log list")
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    assert_eq!(
        actions,
        vec![
            "account.domain_removed",
            "account.domain_verified",
            "account.domain_verification_failed",
            "account.domain_configured",
        ]
    );
}

#[tokio::test]
async fn sftp_lifecycle() {
    let app = app(Arc::default()).await;
    let acme = create_account(&app, "Acme", "acme").await;

    let (status, body) = send(&app, "POST", "/api/accounts/999/sftp", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Account not found");

    let (status, body) = send(&app, "POST", &format!("/api/accounts/{acme}/sftp"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let username = body["username"].as_str().expect("username").to_string();
    let password = body["password"].as_str().expect("password").to_string();
    assert!(username.starts_with("sftp_acme_"));
    assert_eq!(password.len(), 16);

    let (status, body) = send(&app, "POST", &format!("/api/accounts/{acme}/sftp"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(
        body["error"]["message"]
            .as_str()
            .expect("message")
            .contains("already exist")
    );

    let (status, body) = send(&app, "GET", &format!("/api/accounts/{acme}/sftp"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credential"]["username"], username.as_str());
    assert_eq!(body["credential"]["status"], "active");
    assert_eq!(body["gatewayMode"], "mock");
    assert!(!body.to_string().contains(&password));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/accounts/{acme}/buckets"),
        Some(json!({"name": "photos"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sftpSynced"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/accounts/{acme}/sftp/reset-password"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["password"].as_str().expect("password"), password);

    let (status, _) = send(&app, "DELETE", &format!("/api/accounts/{acme}/sftp"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/api/accounts/{acme}/sftp"), None).await;
    assert_eq!(body["credential"]["status"], "revoked");
}
