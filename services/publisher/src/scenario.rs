//! Active-scenario state and validated switching

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::info;
use types::errors::UnknownScenario;
use types::scenario::ScenarioName;

/// Holds which scenario is active and hands out a generation counter
/// so the replay loop can observe switches without holding a lock.
pub struct ScenarioController {
    active: Mutex<ScenarioName>,
    available: Vec<ScenarioName>,
    generation: AtomicU64,
}

impl ScenarioController {
    pub fn new(initial: ScenarioName, available: Vec<ScenarioName>) -> Self {
        Self {
            active: Mutex::new(initial),
            available,
            generation: AtomicU64::new(0),
        }
    }

    pub fn active(&self) -> ScenarioName {
        match self.active.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Bumped on every successful switch; the replay loop compares
    /// this against the value captured at feed activation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> &[ScenarioName] {
        &self.available
    }

    /// Switch the active scenario. The name must parse and the
    /// scenario must have a loaded fixture; on any failure the active
    /// scenario is left unchanged.
    pub fn switch(&self, name: &str) -> Result<ScenarioName, UnknownScenario> {
        let next = ScenarioName::from_str(name)?;
        if !self.available.contains(&next) {
            return Err(UnknownScenario(name.to_string()));
        }

        let previous = {
            let mut active = match self.active.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let previous = *active;
            *active = next;
            previous
        };
        self.generation.fetch_add(1, Ordering::SeqCst);

        info!(from = %previous, to = %next, "Scenario switched");
        Ok(next)
    }
}
