//! Work-plan resource managers
//!
//! Runs the connection pool and cache with a diagnostics HTTP server.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workplan_resources::api::{create_router, AppState};
use workplan_resources::pool::{ResourcePool, TcpConnector};
use workplan_resources::{spawn_reaper_task, Config, TtlCache};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the backend connection pool and create the cache
/// 4. Start the pool reaper if configured
/// 5. Serve the diagnostics router
/// 6. On SIGINT/SIGTERM stop serving and close every pooled connection
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workplan_resources=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting work-plan resource managers");

    let config = Config::from_env();
    info!(
        "Configuration loaded: pool={}..{}, idle_timeout={}ms, cache_ttl={}ms, backend={}, port={}",
        config.pool_min_size,
        config.pool_max_size,
        config.pool_idle_timeout_ms,
        config.cache_default_ttl_ms,
        config.backend_addr,
        config.server_port
    );

    let connector = TcpConnector::new(
        config.backend_addr.clone(),
        config.backend_connect_timeout(),
    );
    info!("Opening connection pool to {}", connector.addr());
    let pool = ResourcePool::new(connector, config.pool_config())
        .await
        .with_context(|| format!("failed to open connection pool to {}", config.backend_addr))?;
    let cache = TtlCache::from_config(&config).context("invalid cache configuration")?;

    let reaper = config
        .reap_interval()
        .map(|interval| spawn_reaper_task(pool.clone(), interval));

    let state = AppState::new(pool.clone(), cache);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Diagnostics listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(reaper))
        .await
        .context("server error")?;

    pool.close_all();
    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the reaper.
async fn shutdown_signal(reaper: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = reaper {
        handle.abort();
        info!("Pool reaper stopped");
    }
}
