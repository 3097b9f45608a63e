// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `threadline serve`: wires storage, provider, relay and gateway together
//! and runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Instant;

use threadline_config::ThreadlineConfig;
use threadline_core::{AssistantProvider, ChatStore, PluginAdapter, RelayError};
use threadline_gateway::{BearerAuth, GatewayState, HealthState};
use threadline_openai::OpenAiProvider;
use threadline_prometheus::PrometheusAdapter;
use threadline_relay::{ChatService, MemoryTokenStore};
use threadline_storage::SqliteStorage;
use tracing::{info, warn};

use crate::shutdown;

/// Run the relay server until a shutdown signal arrives.
pub async fn run_serve(config: ThreadlineConfig) -> Result<(), RelayError> {
    info!(version = env!("CARGO_PKG_VERSION"), mode = ?config.relay.mode, "starting threadline");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let provider: Arc<dyn AssistantProvider> = Arc::new(OpenAiProvider::new(&config.openai)?);

    let prometheus_render = if config.prometheus.enabled {
        let adapter = Arc::new(PrometheusAdapter::new()?);
        Some(Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>)
    } else {
        None
    };

    if config.auth.tokens.is_empty() {
        warn!("no [auth] tokens configured -- every authenticated route will be rejected");
    }

    let cancel = shutdown::install_signal_handler();
    let store: Arc<dyn ChatStore> = storage.clone();
    let service = Arc::new(ChatService::new(
        store.clone(),
        provider.clone(),
        Arc::new(MemoryTokenStore::new()),
        &config.relay,
        cancel.clone(),
    ));
    let sweeper = service.spawn_token_sweeper();

    let state = GatewayState {
        service,
        auth: BearerAuth::from(&config.auth),
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render,
            store,
        },
    };

    let served = threadline_gateway::start_server(&config.server, state, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = sweeper.await {
        warn!(error = %e, "token sweeper task failed");
    }
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    storage.close().await?;
    info!("threadline serve shutdown complete");
    served
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("threadline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
