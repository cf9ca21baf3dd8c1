use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ipalloc_common::config::Config;
use ipalloc_core::allocation::{AllocationService, LoggingAllocator};

use crate::commands::{build_driver, connect_store};
use crate::http;

/// Runs the scan scheduler and the allocation API until SIGINT or SIGTERM.
pub async fn serve(cfg: &Config) -> anyhow::Result<()> {
    let store = connect_store(cfg).await?;
    let driver = build_driver(cfg, store.clone())?;
    let allocator = LoggingAllocator::new(AllocationService::new(store));

    let listener = TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;
    let local: SocketAddr = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let scheduler = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { driver.run(shutdown).await })
    };

    info!(
        listen = %local,
        interval = ?cfg.scan.interval,
        "Allocation API ready"
    );
    let served = axum::serve(listener, http::router(Arc::new(allocator)))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;
    if let Err(e) = &served {
        error!("allocation API stopped unexpectedly: {e}");
    }

    // A failed server still stops the scheduler at its next idle point.
    shutdown.cancel();
    if let Err(e) = scheduler.await {
        error!("scan scheduler failed: {e}");
    }
    info!("Shut down");

    served.context("serving allocation API")
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    error!("cannot listen for shutdown signals: {e}");
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => debug!("received SIGINT"),
            _ = sigterm.recv() => debug!("received SIGTERM"),
            _ = shutdown.cancelled() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("cannot listen for ctrl-c: {e}");
                    return;
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }

    info!("Shutting down, waiting for the current scan pass to finish ...");
    shutdown.cancel();
}
