use mimalloc::MiMalloc;
use reseller_ctl::config::Config;
use reseller_ctl::db::Storage;
use reseller_ctl::domain::{DomainVerifier, HickoryDnsResolver};
use reseller_ctl::router::{AppState, reseller_router};
use reseller_ctl::sftp::{SftpProvisioner, connect_gateway};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        sftpgo_url = %cfg.sftpgo.api_url,
        target_cname = %cfg.domain.target_cname,
        loglevel = %cfg.basic.loglevel,
    );
    if cfg.basic.admin_key.trim().is_empty() {
        return Err("admin key must not be empty; set RESELLER_BASIC__ADMIN_KEY".into());
    }
    if cfg.basic.admin_key == "change-me" {
        warn!("admin key is the built-in default; set RESELLER_BASIC__ADMIN_KEY");
    }

    let storage = Storage::connect(&cfg.basic.database_url).await?;

    let verifier = DomainVerifier::new(Arc::new(HickoryDnsResolver::new()), &cfg.domain);
    let gateway = connect_gateway(&cfg.sftpgo).await;
    info!(mode = ?gateway.mode(), "SFTP gateway selected");
    let provisioner = SftpProvisioner::new(
        storage.clone(),
        gateway,
        cfg.storage.clone(),
        cfg.sftp.clone(),
    );

    let state = AppState::new(storage, verifier, provisioner, cfg.basic.admin_key.clone());
    let app = reseller_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
