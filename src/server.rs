use crate::config::Config;
use crate::http::{create_router, AppState};
use crate::nats::NatsBridge;
use crate::session::SessionRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Serve until SIGINT/SIGTERM, then tear down every session and drain the
/// HTTP server, each bounded by `service.shutdown_grace_secs`.
pub async fn run(config: Config, registry: Arc<SessionRegistry>) -> Result<()> {
    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("{} started on {}", config.service.name, addr);

    let nats_task = if config.nats.enabled {
        let bridge = NatsBridge::connect(&config.nats.url, Arc::clone(&registry)).await?;
        Some(tokio::spawn(async move {
            if let Err(e) = bridge.run().await {
                error!("NATS bridge stopped: {:#}", e);
            }
        }))
    } else {
        None
    };

    let router = create_router(AppState::new(Arc::clone(&registry)));
    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = drain_rx.await;
            })
            .await
    });

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut server => {
            return result
                .context("HTTP server task failed")?
                .context("HTTP server error");
        }
    }

    info!("Received shutdown signal, cleaning up...");
    let grace = config.service.shutdown_grace();

    if tokio::time::timeout(grace, registry.remove_all()).await.is_err() {
        warn!("Session cleanup did not finish within {:?}", grace);
    }

    if let Some(task) = nats_task {
        task.abort();
    }

    let _ = drain_tx.send(());
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => error!("HTTP server error during shutdown: {}", e),
        Ok(Err(e)) => error!("HTTP server task panicked: {}", e),
        Err(_) => warn!("In-flight requests did not drain within {:?}, exiting anyway", grace),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
