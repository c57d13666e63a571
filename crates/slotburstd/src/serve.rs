//! `slotburstd serve`: API server, timer triggers, local dispatcher.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use slotburst_api::{ApiState, build_router};
use slotburst_controller::{CallbackTarget, CapacityController, ControllerConfig, ReleaseExecutor};
use slotburst_core::Settings;

use crate::backends::Backends;
use crate::{dispatch, timers};

const DISPATCH_TICK: Duration = Duration::from_secs(1);

pub async fn run(port: u16, settings: Settings) -> anyhow::Result<()> {
    info!(
        ceiling = settings.ceiling,
        domain = %settings.domain,
        default_region = %settings.default_region,
        "slotburst starting"
    );

    let backends = Backends::connect(&settings)?;
    let config = ControllerConfig::from_settings(&settings);
    let controller = CapacityController::new(
        config.clone(),
        backends.ledger.clone(),
        backends.tasks.clone(),
    );
    let releaser = ReleaseExecutor::new(config, backends.ledger.clone());

    // ── Background tasks ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    if !settings.timers.is_empty() {
        let base_url = settings
            .callback
            .public_base_url
            .as_deref()
            .context("timer triggers need callback.public_base_url")?;
        let target = CallbackTarget::from_base_url(base_url);
        for spec in settings.timers.iter().cloned() {
            handles.push(tokio::spawn(timers::run(
                spec,
                controller.clone(),
                target.clone(),
                shutdown_rx.clone(),
            )));
        }
    }

    if let Some(queue) = backends.local_queue {
        handles.push(tokio::spawn(dispatch::run(
            queue,
            releaser.clone(),
            DISPATCH_TICK,
            shutdown_rx.clone(),
        )));
    }

    // ── REST API server ──────────────────────────────────────────
    let router = build_router(ApiState {
        controller,
        releaser,
        callback: settings.callback.clone(),
        default_domain: settings.domain.clone(),
        default_region: settings.default_region.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for handle in handles {
        let _ = handle.await;
    }

    info!("slotburst stopped");
    Ok(())
}

/// Resolves on CTRL+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
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
