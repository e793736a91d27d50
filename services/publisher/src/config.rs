//! Publisher configuration
//!
//! Defaults match the original deployment profile; every knob that
//! matters for reproducing an incident (queue cap, per-scenario
//! processing delay, thresholds, feed seed) lives here so runs are
//! comparable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use types::health::HealthThresholds;
use types::scenario::ScenarioName;

/// Configuration for the publisher service.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Optional queue depth cap. `None` keeps the queue unbounded,
    /// which is the deliberate default: the backlog is the incident.
    pub queue_cap: Option<usize>,
    /// Artificial processing delay per scenario, in milliseconds.
    pub processing_delay_ms: BTreeMap<ScenarioName, u64>,
    /// Fallback delay for scenarios absent from the map.
    pub default_processing_delay_ms: u64,
    /// Period between health reports.
    pub heartbeat_interval: Duration,
    /// Process memory above which an incident alert is raised.
    pub memory_threshold_mb: f64,
    /// Thresholds for the degraded-status decision.
    pub health: HealthThresholds,
    /// Scenario active at startup.
    pub initial_scenario: ScenarioName,
    /// Book depth published per side.
    pub top_levels: usize,
    /// Seed for the feed's inter-arrival delay draws.
    pub feed_seed: u64,
    /// Directory holding the generated scenario fixture files.
    pub data_dir: PathBuf,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        let mut processing_delay_ms = BTreeMap::new();
        processing_delay_ms.insert(ScenarioName::Stable, 10);
        processing_delay_ms.insert(ScenarioName::Burst, 100);
        processing_delay_ms.insert(ScenarioName::GradualSpike, 50);
        processing_delay_ms.insert(ScenarioName::ExtremeSpike, 200);

        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            queue_cap: None,
            processing_delay_ms,
            default_processing_delay_ms: 50,
            heartbeat_interval: Duration::from_secs(1),
            memory_threshold_mb: 150.0,
            health: HealthThresholds::default(),
            initial_scenario: ScenarioName::Stable,
            top_levels: 15,
            feed_seed: 42,
            data_dir: PathBuf::from("data/generated"),
        }
    }
}

impl PublisherConfig {
    /// Load configuration, applying environment overrides to the
    /// defaults. Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }
        if let Some(cap) = env_parse::<usize>("QUEUE_CAP") {
            config.queue_cap = Some(cap);
        }
        if let Some(mb) = env_parse("MEMORY_THRESHOLD_MB") {
            config.memory_threshold_mb = mb;
        }
        if let Some(seed) = env_parse("FEED_SEED") {
            config.feed_seed = seed;
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Artificial processing delay for a scenario.
    pub fn delay_for(&self, scenario: ScenarioName) -> u64 {
        self.processing_delay_ms
            .get(&scenario)
            .copied()
            .unwrap_or(self.default_processing_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
