use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use subscriber::client::{run, ClientConfig};
use subscriber::view::{ClientView, FreshnessConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ClientConfig::default();
    if let Ok(url) = std::env::var("WS_URL") {
        config.url = url;
    }
    info!(
        url = %config.url,
        client_id = %config.client_id,
        version = subscriber::CLIENT_VERSION,
        "Starting subscriber"
    );

    let view = Arc::new(Mutex::new(ClientView::new(
        FreshnessConfig::default(),
        Utc::now(),
    )));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let status_view = Arc::clone(&view);
    let mut status_shutdown = shutdown_rx.clone();
    let status_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Ok(view) = status_view.lock() {
                        info!(
                            updates = view.counts.updates,
                            heartbeats = view.counts.heartbeats,
                            incidents = view.incidents().count(),
                            sequence_gaps = view.sequence_gaps(),
                            scenario = ?view.scenario(),
                            "Client status"
                        );
                    }
                }
                _ = status_shutdown.changed() => break,
            }
        }
    });

    let client_task = tokio::spawn(run(config, Arc::clone(&view), shutdown_rx));

    let ctrl_c_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // Runs until the server closes normally or ctrl-c stops it
    let _ = client_task.await;
    ctrl_c_task.abort();
    status_task.abort();

    let incidents = match view.lock() {
        Ok(view) => view.incidents().count(),
        Err(poisoned) => poisoned.into_inner().incidents().count(),
    };
    info!(incidents, "Subscriber stopped");

    Ok(())
}
