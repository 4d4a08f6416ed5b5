use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use calcom_relay::{
    AppState, BookingCache, BookingRelay, CalcomClient, LogFormat, RelayConfig, RelayServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::load().context("Failed to load configuration")?;
    init_tracing(&config)?;

    let addr = config.server_addr()?;
    info!(
        %addr,
        base_url = %config.cal_api_base_url,
        timeout_ms = config.cal_api_timeout_ms,
        "Configuration loaded"
    );

    let missing = config.missing_equipment();
    if !missing.is_empty() {
        warn!(?missing, "No API key configured for some equipment types");
    }
    if config.fallback_key().is_none() {
        warn!("CAL_API_KEY not set, requests without equipmentType will be rejected");
    }

    let client = CalcomClient::new(&config.cal_api_base_url, config.upstream_timeout())
        .context("Failed to build Cal.com client")?;
    let relay = BookingRelay::new(Arc::new(client), config.credentials());
    info!(equipment = ?relay.equipment_types(), "Credential table ready");

    let state = AppState::new(relay, BookingCache::new());
    RelayServer::new(addr, state)
        .with_max_body_bytes(config.max_body_bytes)
        .serve(shutdown_signal())
        .await?;

    Ok(())
}

// RUST_LOG wins over LOG_LEVEL
fn init_tracing(config: &RelayConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid LOG_LEVEL: {}", config.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
