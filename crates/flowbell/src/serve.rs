// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `flowbell serve` command implementation.
//!
//! Opens the SQLite queue, starts the delivery pool and the retention task,
//! and serves the local HTTP API until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use flowbell_config::FlowbellConfig;
use flowbell_core::{FlowbellError, PreferenceStore, StorageAdapter};
use flowbell_pipeline::shutdown;
use flowbell_pipeline::{
    DeliveryPool, DeliveryWorker, JsonFilePreferenceStore, RetentionTask, TieredPreferences,
};
use flowbell_storage::SqliteStorage;
use tracing::{error, info, warn};

#[cfg(feature = "gateway")]
use flowbell_gateway::GatewayState;
#[cfg(feature = "gateway")]
use flowbell_pipeline::StatisticsAggregator;

/// Open the queue database and the two-tier preference store in front of it.
pub(crate) async fn open_stores(
    config: &FlowbellConfig,
) -> Result<(Arc<SqliteStorage>, Arc<dyn PreferenceStore>), FlowbellError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);

    let fallback = JsonFilePreferenceStore::new(&config.storage.fallback_preferences_path);
    let preferences: Arc<dyn PreferenceStore> =
        Arc::new(TieredPreferences::new(storage.clone(), Arc::new(fallback)));
    Ok((storage, preferences))
}

/// Runs the `flowbell serve` command.
pub async fn run_serve(config: FlowbellConfig) -> Result<(), FlowbellError> {
    info!(name = config.service.name.as_str(), "starting flowbell serve");

    let (storage, preferences) = open_stores(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let worker = Arc::new(DeliveryWorker::new(
        &config,
        storage.clone(),
        preferences.clone(),
    )?);
    if worker.webhook_url().await?.is_none() {
        warn!("no webhook URL configured; queued notifications will wait until one is set");
    }
    let pool = DeliveryPool::start(worker, config.delivery.workers, cancel.clone()).await?;

    let retention = RetentionTask::new(
        storage.clone(),
        preferences.clone(),
        Duration::from_secs(config.retention.cleanup_interval_secs),
    );
    let retention_handle = tokio::spawn(retention.run(cancel.clone()));

    #[cfg(feature = "gateway")]
    let gateway_handle = if config.gateway.enabled {
        let state = GatewayState::new(
            storage.clone(),
            preferences.clone(),
            StatisticsAggregator::new(storage.clone(), config.health.clone()),
            storage.clone(),
        );
        let gateway_config = config.gateway.clone();
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) =
                flowbell_gateway::start_server(&gateway_config, state, gateway_cancel.clone()).await
            {
                error!(error = %e, "gateway failed");
                gateway_cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };
    #[cfg(not(feature = "gateway"))]
    let gateway_handle: Option<tokio::task::JoinHandle<()>> = None;

    info!(workers = config.delivery.workers, "flowbell ready");

    pool.join().await;
    if let Err(e) = retention_handle.await {
        error!(error = %e, "retention task panicked");
    }
    if let Some(handle) = gateway_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "gateway task panicked");
        }
    }

    storage.close().await?;
    info!("flowbell stopped");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
///
/// Events go to stderr so command output on stdout stays clean.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flowbell={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
