//! Shared application state and simulation lifecycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::PublisherConfig;
use crate::feed::{run_replay, FeedProgress};
use crate::fixtures::FixtureSource;
use crate::health::SharedSample;
use crate::queue::ProcessingQueue;
use crate::registry::ConnectionRegistry;
use crate::scenario::ScenarioController;

const GREETING: &str = "Connected to MarketDataPublisher";

/// Lifecycle of the feed replay task. The broadcast engine and health
/// reporter run for the life of the process; only the producer side is
/// started and stopped through this handle.
pub struct SimulationHandle {
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    progress: Arc<Mutex<Option<FeedProgress>>>,
}

impl SimulationHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            progress: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> Option<FeedProgress> {
        match self.progress.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PublisherConfig>,
    pub queue: Arc<ProcessingQueue>,
    pub registry: Arc<ConnectionRegistry>,
    pub scenario: Arc<ScenarioController>,
    pub fixtures: Arc<dyn FixtureSource>,
    pub last_sample: SharedSample,
    pub simulation: Arc<SimulationHandle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<PublisherConfig>, fixtures: Arc<dyn FixtureSource>) -> Self {
        let scenario = Arc::new(ScenarioController::new(
            config.initial_scenario,
            fixtures.available(),
        ));
        Self {
            queue: Arc::new(ProcessingQueue::new(config.queue_cap)),
            registry: Arc::new(ConnectionRegistry::new(GREETING)),
            scenario,
            fixtures,
            last_sample: Arc::new(Mutex::new(None)),
            simulation: Arc::new(SimulationHandle::new()),
            started_at: Instant::now(),
            config,
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Start the feed replay. Returns false when already running.
    pub fn start_simulation(&self) -> bool {
        if self
            .simulation
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let task = tokio::spawn(run_replay(
            Arc::clone(&self.fixtures),
            Arc::clone(&self.queue),
            Arc::clone(&self.scenario),
            Arc::clone(&self.config),
            Arc::clone(&self.simulation.running),
            Arc::clone(&self.simulation.progress),
        ));

        let mut slot = match self.simulation.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }

        info!(scenario = %self.scenario.active(), "Simulation started");
        true
    }

    /// Stop the feed replay. Returns false when not running. Already
    /// queued entries keep draining through the engine.
    pub fn stop_simulation(&self) -> bool {
        if !self.simulation.running.swap(false, Ordering::SeqCst) {
            return false;
        }

        let task = {
            let mut slot = match self.simulation.task.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        // The loop checks the flag between pulls; abort cuts any
        // in-flight inter-arrival sleep short
        if let Some(task) = task {
            task.abort();
        }

        info!("Simulation stopped");
        true
    }
}
