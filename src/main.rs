//! Application entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use ethers::providers::{Http, Middleware, Provider};
use ethers::utils::format_units;
use tokio::signal;
use tracing::{error, info, warn};

use worboo_relayer::api::create_router;
use worboo_relayer::app::{
    AppState, EventListener, RelayerMetrics, RewardService, spawn_listener,
    spawn_metrics_persister,
};
use worboo_relayer::config::{RelayerConfig, TOKEN_DECIMALS};
use worboo_relayer::domain::{EventStore, RewardToken};
use worboo_relayer::infra::{
    EthRegistryEventSource, EthRewardToken, JsonFileEventStore, init_tracing,
};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = RelayerConfig::from_env().context("Invalid relayer configuration")?;
    init_tracing(&config.log);

    info!("Worboo relayer v{}", env!("CARGO_PKG_VERSION"));

    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .with_context(|| format!("Invalid RELAYER_RPC_URL: {}", config.rpc_url))?;
    let chain_id = provider
        .get_chainid()
        .await
        .context("Failed to query chain id")?
        .as_u64();
    let wallet = config.wallet(chain_id)?;

    let token = Arc::new(EthRewardToken::new(
        provider.clone(),
        wallet,
        config.token_address,
        config.confirmations,
        config.confirmation_timeout(),
    ));
    let source = Arc::new(EthRegistryEventSource::with_provider(
        Arc::new(provider),
        config.registry_address,
    ));

    let cache_path = JsonFileEventStore::resolve_default_path(config.cache_path.clone());
    let store: Arc<dyn EventStore> =
        Arc::new(JsonFileEventStore::open(&cache_path, Some(config.cache_max_entries)).await);

    let health_path = RelayerMetrics::resolve_default_path(config.health_path.clone());
    let metrics = Arc::new(RelayerMetrics::new(Some(health_path.clone())));

    let retry = config.retry_policy();
    info!(
        chain_id,
        registry = ?source.address(),
        token = ?token.address(),
        reward = %format_units(config.reward_per_win, TOKEN_DECIMALS).unwrap_or_default(),
        operator = ?token.operator_address(),
        retries = retry.max_attempts,
        backoff_ms = config.backoff_ms,
        cache = %cache_path.display(),
        processed = store.len(),
        health = %health_path.display(),
        "Starting Worboo reward listener"
    );

    let service = Arc::new(RewardService::new(
        Arc::clone(&store),
        token,
        Arc::clone(&metrics),
        config.reward_per_win,
        retry,
    ));

    let (persister_handle, persister_shutdown_tx) = spawn_metrics_persister(Arc::clone(&metrics));
    if let Err(e) = metrics.persist().await {
        warn!(error = %e, "Initial metrics write failed");
    }

    let listener = EventListener::new(source, service, config.listener_config());
    let (listener_handle, listener_shutdown_tx) = spawn_listener(listener);

    if config.health_enabled {
        let state = Arc::new(AppState::new(Arc::clone(&store), Arc::clone(&metrics)));
        let router = create_router(state);

        let addr = config.health_addr();
        let tcp = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind health server on {}", addr))?;
        info!("Health server listening on http://{}/healthz", tcp.local_addr()?);

        axum::serve(tcp, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        info!("Health server disabled");
        shutdown_signal().await;
    }

    info!("Shutting down relayer...");
    let _ = listener_shutdown_tx.send(true);
    if let Err(e) = listener_handle.await {
        warn!(error = %e, "Listener task ended abnormally");
    }
    let _ = persister_shutdown_tx.send(true);
    if let Err(e) = persister_handle.await {
        warn!(error = %e, "Metrics persister ended abnormally");
    }

    info!("Relayer shutdown complete");
    Ok(())
}
