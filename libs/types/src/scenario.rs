//! Named replay scenarios and their timed phases
//!
//! A scenario is a fixed, named policy governing inter-arrival delay
//! and volatility of produced snapshots. The set of scenarios is
//! closed; switching requests referencing unknown names are rejected
//! before any state changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::UnknownScenario;

/// The closed set of replayable scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScenarioName {
    /// Normal operation: slow cadence, low volatility.
    #[serde(rename = "stable-mode")]
    Stable,
    /// High-frequency market spike.
    #[serde(rename = "burst-mode")]
    Burst,
    /// Phased ramp from calm to stressed.
    #[serde(rename = "gradual-spike")]
    GradualSpike,
    /// Single-digit-millisecond inter-arrival delays; the deliberate
    /// mechanism for overloading the processing queue.
    #[serde(rename = "extreme-spike")]
    ExtremeSpike,
}

impl ScenarioName {
    /// All scenarios, in listing order.
    pub const ALL: [ScenarioName; 4] = [
        ScenarioName::Stable,
        ScenarioName::Burst,
        ScenarioName::GradualSpike,
        ScenarioName::ExtremeSpike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::Stable => "stable-mode",
            ScenarioName::Burst => "burst-mode",
            ScenarioName::GradualSpike => "gradual-spike",
            ScenarioName::ExtremeSpike => "extreme-spike",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioName {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|name| name.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

/// Inclusive inter-arrival delay bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalBounds {
    pub min: u64,
    pub max: u64,
}

impl IntervalBounds {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Midpoint of the bounds, used for progress estimates.
    pub fn mean(&self) -> f64 {
        (self.min + self.max) as f64 / 2.0
    }
}

/// One timed phase of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase length in milliseconds.
    pub duration_ms: u64,
    /// Inter-arrival delay bounds drawn from during this phase.
    #[serde(rename = "interval_ms")]
    pub interval: IntervalBounds,
    /// Volatility band of the fixture data for this phase.
    pub volatility: f64,
}

/// A named scenario with its ordered phases.
///
/// The current phase is derived from elapsed time since the scenario
/// became active; switching scenarios resets elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: ScenarioName,
    pub phases: Vec<Phase>,
}

impl ScenarioSpec {
    /// Single-phase scenario helper.
    pub fn single_phase(name: ScenarioName, duration_ms: u64, interval: IntervalBounds) -> Self {
        Self {
            name,
            phases: vec![Phase {
                duration_ms,
                interval,
                volatility: 0.0,
            }],
        }
    }

    /// Total scripted duration across all phases.
    pub fn total_duration_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms).sum()
    }

    /// Phase active at `elapsed_ms` since scenario start, with its
    /// index. Returns `None` once all phases are exhausted.
    pub fn phase_at(&self, elapsed_ms: u64) -> Option<(usize, &Phase)> {
        let mut offset = 0u64;
        for (idx, phase) in self.phases.iter().enumerate() {
            offset += phase.duration_ms;
            if elapsed_ms < offset {
                return Some((idx, phase));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phased_spec() -> ScenarioSpec {
        ScenarioSpec {
            name: ScenarioName::GradualSpike,
            phases: vec![
                Phase {
                    duration_ms: 1000,
                    interval: IntervalBounds::new(100, 200),
                    volatility: 0.001,
                },
                Phase {
                    duration_ms: 2000,
                    interval: IntervalBounds::new(5, 10),
                    volatility: 0.01,
                },
            ],
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for name in ScenarioName::ALL {
            assert_eq!(name.as_str().parse::<ScenarioName>().unwrap(), name);
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = "chaos-mode".parse::<ScenarioName>().unwrap_err();
        assert_eq!(err.0, "chaos-mode");
    }

    #[test]
    fn test_serde_uses_kebab_names() {
        let json = serde_json::to_string(&ScenarioName::ExtremeSpike).unwrap();
        assert_eq!(json, r#""extreme-spike""#);
    }

    #[test]
    fn test_phase_at_boundaries() {
        let spec = phased_spec();
        assert_eq!(spec.phase_at(0).unwrap().0, 0);
        assert_eq!(spec.phase_at(999).unwrap().0, 0);
        assert_eq!(spec.phase_at(1000).unwrap().0, 1);
        assert_eq!(spec.phase_at(2999).unwrap().0, 1);
        assert!(spec.phase_at(3000).is_none());
    }

    #[test]
    fn test_total_duration() {
        assert_eq!(phased_spec().total_duration_ms(), 3000);
    }
}
