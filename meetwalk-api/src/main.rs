use std::sync::Arc;

use meetwalk_api::config::AppConfig;
use meetwalk_api::{build_router, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meetwalk_shared::middleware::init_tracing("meetwalk-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = meetwalk_shared::middleware::init_metrics()?;
    let store = store::connect(&config)?;

    let state = Arc::new(AppState {
        store,
        config,
        metrics_handle: Some(metrics_handle),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "meetwalk-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("meetwalk-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received Ctrl+C, shutting down");
    }
}
