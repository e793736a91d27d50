//! End-to-end pipeline tests: feed through queue and engine out to a
//! registered subscriber channel.

use std::sync::Arc;
use std::time::Duration;

use publisher::broadcast::BroadcastEngine;
use publisher::config::PublisherConfig;
use publisher::fixtures::{FixtureUpdate, InMemoryFixtures, ScenarioFixture};
use publisher::health::HealthReporter;
use publisher::registry::Outbound;
use publisher::state::AppState;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use types::health::ServerStatus;
use types::scenario::{IntervalBounds, ScenarioName, ScenarioSpec};
use types::snapshot::BookLevel;
use types::wire::{Classified, Envelope};

fn fixture(updates: usize, interval_ms: u64) -> ScenarioFixture {
    ScenarioFixture {
        spec: ScenarioSpec::single_phase(
            ScenarioName::Stable,
            u64::MAX,
            IntervalBounds::new(interval_ms, interval_ms),
        ),
        updates: (0..updates)
            .map(|i| FixtureUpdate {
                bids: vec![BookLevel::new(
                    Decimal::new(11_999_000 - i as i64, 2),
                    Decimal::ONE,
                )],
                asks: vec![BookLevel::new(
                    Decimal::new(12_001_000 + i as i64, 2),
                    Decimal::ONE,
                )],
            })
            .collect(),
    }
}

fn build_state(config: PublisherConfig, updates: usize, interval_ms: u64) -> AppState {
    let fixtures = Arc::new(InMemoryFixtures::new().with(fixture(updates, interval_ms)));
    AppState::new(Arc::new(config), fixtures)
}

fn spawn_engine(state: &AppState, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    let engine = BroadcastEngine::new(
        Arc::clone(&state.config),
        Arc::clone(&state.queue),
        Arc::clone(&state.registry),
        Arc::clone(&state.scenario),
    );
    tokio::spawn(engine.run(shutdown))
}

fn subscribe(state: &AppState) -> mpsc::UnboundedReceiver<Outbound> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(tx, state.scenario.active());
    // Swallow the connection ack
    let _ = rx.try_recv();
    rx
}

async fn next_classified(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Classified {
    let frame = match timeout(Duration::from_secs(60), rx.recv()).await {
        Ok(Some(Outbound::Frame(frame))) => frame,
        other => panic!("expected frame, got {:?}", other),
    };
    Envelope::parse(&frame).unwrap().classify().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_updates_arrive_in_order_with_metadata() {
    let state = build_state(PublisherConfig::default(), 5, 10);
    let mut rx = subscribe(&state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = spawn_engine(&state, shutdown_rx);
    assert!(state.start_simulation());

    for expected in 1..=5u64 {
        match next_classified(&mut rx).await {
            Classified::OrderbookUpdate(update) => {
                assert_eq!(update.snapshot.sequence_id, expected);
                assert!(update.snapshot.is_well_formed());
                // Stable scenario carries a 10ms artificial delay
                assert!(update.processing_time_ms >= 10.0);
            }
            other => panic!("expected orderbook_update, got {:?}", other),
        }
    }

    // Everything drained
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.queue.depth(), 0);

    let _ = shutdown_tx.send(true);
    engine_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fast_producer_slow_consumer_builds_backlog() {
    let mut config = PublisherConfig::default();
    // 200ms per message against 1ms production: backlog by design
    config.processing_delay_ms.insert(ScenarioName::Stable, 200);
    let state = build_state(config, 50, 1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = spawn_engine(&state, shutdown_rx);
    assert!(state.start_simulation());

    // Production finishes in ~50ms while the engine has processed one
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.queue.depth() > 40, "depth {}", state.queue.depth());

    // Nothing is dropped on the unbounded default
    assert_eq!(state.queue.dropped(), 0);

    let _ = shutdown_tx.send(true);
    engine_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_degrades_under_backlog() {
    let mut config = PublisherConfig::default();
    config.processing_delay_ms.insert(ScenarioName::Stable, 500);
    config.health.max_queue_depth = 10;
    config.memory_threshold_mb = 1_000_000.0;
    let state = build_state(config, 100, 1);
    let mut rx = subscribe(&state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = spawn_engine(&state, shutdown_rx.clone());
    let reporter = HealthReporter::new(
        Arc::clone(&state.config),
        Arc::clone(&state.queue),
        Arc::clone(&state.registry),
        Arc::clone(&state.scenario),
        Arc::clone(&state.last_sample),
        state.started_at,
    );
    let reporter_task = tokio::spawn(reporter.run(shutdown_rx));
    assert!(state.start_simulation());

    // Scan broadcast traffic for a degraded heartbeat
    let mut saw_degraded = false;
    for _ in 0..200 {
        if let Classified::Heartbeat(sample) = next_classified(&mut rx).await {
            if sample.status == ServerStatus::Degraded {
                assert!(sample.queue_depth > 10);
                saw_degraded = true;
                break;
            }
        }
    }
    assert!(saw_degraded, "no degraded heartbeat observed");

    state.stop_simulation();
    let _ = shutdown_tx.send(true);
    engine_task.await.unwrap();
    reporter_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scenario_switch_changes_delay_and_greeting() {
    let fixtures = Arc::new(
        InMemoryFixtures::new()
            .with(fixture(5, 10))
            .with(ScenarioFixture {
                spec: ScenarioSpec::single_phase(
                    ScenarioName::ExtremeSpike,
                    u64::MAX,
                    IntervalBounds::new(1, 1),
                ),
                updates: Vec::new(),
            }),
    );
    let state = AppState::new(Arc::new(PublisherConfig::default()), fixtures);

    state.scenario.switch("extreme-spike").unwrap();
    assert_eq!(state.scenario.active(), ScenarioName::ExtremeSpike);
    assert_eq!(state.config.delay_for(state.scenario.active()), 200);

    // New connections are greeted with the now-active scenario
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(tx, state.scenario.active());
    match next_classified(&mut rx).await {
        Classified::ConnectionAck(ack) => assert_eq!(ack.scenario, ScenarioName::ExtremeSpike),
        other => panic!("expected ack, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_subscribers() {
    let state = build_state(PublisherConfig::default(), 1, 10);
    let mut rx = subscribe(&state);

    state.registry.close_all();
    assert_eq!(state.registry.client_count(), 0);
    match timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(Outbound::Close)) => {}
        other => panic!("expected close, got {:?}", other),
    }
}
