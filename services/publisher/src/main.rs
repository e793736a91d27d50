use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use publisher::broadcast::BroadcastEngine;
use publisher::config::PublisherConfig;
use publisher::fixtures::load_fixture_dir;
use publisher::health::HealthReporter;
use publisher::router::create_router;
use publisher::state::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = publisher::SERVICE_VERSION,
        "Starting market data publisher"
    );

    let config = Arc::new(PublisherConfig::from_env());
    let fixtures = Arc::new(
        load_fixture_dir(&config.data_dir)
            .with_context(|| format!("loading fixtures from {}", config.data_dir.display()))?,
    );
    let state = AppState::new(Arc::clone(&config), fixtures);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = BroadcastEngine::new(
        Arc::clone(&state.config),
        Arc::clone(&state.queue),
        Arc::clone(&state.registry),
        Arc::clone(&state.scenario),
    );
    let engine_task = tokio::spawn(engine.run(shutdown_rx.clone()));

    let reporter = HealthReporter::new(
        Arc::clone(&state.config),
        Arc::clone(&state.queue),
        Arc::clone(&state.registry),
        Arc::clone(&state.scenario),
        Arc::clone(&state.last_sample),
        state.started_at,
    );
    let reporter_task = tokio::spawn(reporter.run(shutdown_rx));

    state.start_simulation();

    let app = create_router(state.clone());
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    state.stop_simulation();
    let _ = shutdown_tx.send(true);
    state.registry.close_all();
    let _ = engine_task.await;
    let _ = reporter_task.await;

    Ok(())
}
