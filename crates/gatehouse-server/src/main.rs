use anyhow::Context;
use gatehouse_core::load_config;
use gatehouse_server::{AppState, logging, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config().context("loading configuration")?;
    logging::init(cfg.server.json_logs);

    let state = AppState::from_config(&cfg).await?;
    let shutdown = Arc::new(Notify::new());
    let app = routes::router(state, shutdown.clone());

    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(address = %cfg.server.bind, "gatehouse listening");

    let grace = cfg.server.shutdown_timeout()?;
    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "failed to listen for ctrl-c");
                    }
                    tracing::info!("interrupt received, shutting down");
                }
                _ = shutdown.notified() => {
                    tracing::warn!("shutdown requested by a request handler");
                }
            }
            stopping.notify_one();
        }
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal);

    tokio::select! {
        result = server => result.context("serving")?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(timeout = ?grace, "in-flight requests did not finish in time");
        }
    }

    tracing::info!("gatehouse stopped");
    Ok(())
}
