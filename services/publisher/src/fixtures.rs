//! Scenario fixture loading
//!
//! Fixtures are produced offline by the synthetic data generator (out
//! of scope here) as one JSON file per scenario:
//!
//! ```text
//! { "scenario": { "duration": .., "updateInterval": {..}, "phases": [..] },
//!   "updates":  [ { "stream": "..", "data": { "lastUpdateId": .., "bids": [..], "asks": [..] } }, .. ],
//!   "metadata": { "totalUpdates": .., "duration": .. } }
//! ```
//!
//! The loader maps each file into a `ScenarioFixture` (phase spec +
//! ordered raw book levels); the feed assigns sequence ids and
//! timestamps at replay time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};
use types::scenario::{IntervalBounds, Phase, ScenarioName, ScenarioSpec};
use types::snapshot::BookLevel;

/// Errors raised while loading fixture files.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture file not found for scenario '{scenario}': {path:?}")]
    NotFound { scenario: ScenarioName, path: PathBuf },

    #[error("failed reading fixture {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing fixture {path:?}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("no fixture loaded for scenario '{0}'")]
    Missing(ScenarioName),
}

/// One raw update from a fixture file: the book sides, pre-ordered
/// best-first by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureUpdate {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// A fully loaded scenario: its phase spec and ordered updates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioFixture {
    pub spec: ScenarioSpec,
    pub updates: Vec<FixtureUpdate>,
}

/// Source of replayable fixtures, keyed by scenario name.
///
/// The data behind this interface is produced by the offline
/// generator; tests substitute an in-memory implementation.
pub trait FixtureSource: Send + Sync {
    /// Fixture for a named scenario.
    fn fixture(&self, name: ScenarioName) -> Result<ScenarioFixture, FixtureError>;

    /// Scenarios this source can replay.
    fn available(&self) -> Vec<ScenarioName>;
}

/// In-memory fixture set; the production loader caches into this and
/// tests build it directly.
#[derive(Default)]
pub struct InMemoryFixtures {
    fixtures: BTreeMap<ScenarioName, ScenarioFixture>,
}

impl InMemoryFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fixture: ScenarioFixture) {
        self.fixtures.insert(fixture.spec.name, fixture);
    }

    pub fn with(mut self, fixture: ScenarioFixture) -> Self {
        self.insert(fixture);
        self
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

impl FixtureSource for InMemoryFixtures {
    fn fixture(&self, name: ScenarioName) -> Result<ScenarioFixture, FixtureError> {
        self.fixtures
            .get(&name)
            .cloned()
            .ok_or(FixtureError::Missing(name))
    }

    fn available(&self) -> Vec<ScenarioName> {
        self.fixtures.keys().copied().collect()
    }
}

/// Load every scenario's fixture file from `dir` into memory.
///
/// Files follow the generator's naming convention
/// (`<scenario>-data.json`). A missing or unparsable file is logged
/// and skipped so the remaining scenarios stay replayable; an error is
/// returned only when nothing at all could be loaded.
pub fn load_fixture_dir(dir: &Path) -> Result<InMemoryFixtures, FixtureError> {
    let mut loaded = InMemoryFixtures::new();

    for name in ScenarioName::ALL {
        let path = dir.join(format!("{}-data.json", name));
        match load_fixture_file(name, &path) {
            Ok(fixture) => {
                info!(
                    scenario = %name,
                    updates = fixture.updates.len(),
                    phases = fixture.spec.phases.len(),
                    "Loaded scenario fixture"
                );
                loaded.insert(fixture);
            }
            Err(e) => {
                warn!(scenario = %name, error = %e, "Skipping scenario fixture");
            }
        }
    }

    if loaded.is_empty() {
        return Err(FixtureError::NotFound {
            scenario: ScenarioName::Stable,
            path: dir.join("stable-mode-data.json"),
        });
    }

    Ok(loaded)
}

/// Load and convert a single fixture file.
pub fn load_fixture_file(name: ScenarioName, path: &Path) -> Result<ScenarioFixture, FixtureError> {
    if !path.exists() {
        return Err(FixtureError::NotFound {
            scenario: name,
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let file: FixtureFile = serde_json::from_str(&raw).map_err(|e| FixtureError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    Ok(convert(name, file))
}

// --- fixture file schema (generator output, camelCase) ---

#[derive(Debug, Deserialize)]
struct FixtureFile {
    scenario: RawScenario,
    updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScenario {
    duration: u64,
    #[serde(default)]
    update_interval: Option<RawInterval>,
    #[serde(default)]
    volatility: Option<f64>,
    #[serde(default)]
    phases: Option<Vec<RawPhase>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhase {
    duration: u64,
    update_interval: RawInterval,
    #[serde(default)]
    volatility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawInterval {
    min: u64,
    max: u64,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    data: RawDepth,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDepth {
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
}

fn convert(name: ScenarioName, file: FixtureFile) -> ScenarioFixture {
    let phases = match file.scenario.phases {
        Some(raw_phases) if !raw_phases.is_empty() => raw_phases
            .into_iter()
            .map(|p| Phase {
                duration_ms: p.duration,
                interval: IntervalBounds::new(p.update_interval.min, p.update_interval.max),
                volatility: p.volatility.unwrap_or(0.0),
            })
            .collect(),
        _ => {
            let interval = file
                .scenario
                .update_interval
                .map(|i| IntervalBounds::new(i.min, i.max))
                .unwrap_or(IntervalBounds::new(100, 100));
            vec![Phase {
                duration_ms: file.scenario.duration,
                interval,
                volatility: file.scenario.volatility.unwrap_or(0.0),
            }]
        }
    };

    let updates = file
        .updates
        .into_iter()
        .map(|u| FixtureUpdate {
            bids: u.data.bids,
            asks: u.data.asks,
        })
        .collect();

    ScenarioFixture {
        spec: ScenarioSpec { name, phases },
        updates,
    }
}
