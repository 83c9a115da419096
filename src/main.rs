//! Antifraud backend entrypoint: builds the dependency object (store,
//! classifier client, authorizer, token signer) once and serves the REST
//! surface until interrupted.

use antifraud_backend::{
    build_router, AppConfig, AppState, ClassifierClient, Store, StructuredLogger, TokenSigner,
    TransferAuthorizer,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("ANTIFRAUD_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = ?config_path, "antifraud backend starting");

    let store = Arc::new(Store::open(&config.database.path)?);
    if store.count_users()? == 0 {
        let seeded = store.seed_demo_users()?;
        info!(users = seeded, "seeded demo population");
    }

    let classifier = Arc::new(ClassifierClient::new(&config.classifier)?);
    let tokens = Arc::new(TokenSigner::new(
        &config.auth.signing_key,
        config.auth.token_ttl_hours,
    ));
    let authorizer = Arc::new(TransferAuthorizer::new(store.clone(), classifier));

    let state = AppState {
        store,
        authorizer,
        tokens,
        superusers: Arc::new(config.auth.superusers.clone()),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, classifier = %config.classifier.base_url, "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("antifraud backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
