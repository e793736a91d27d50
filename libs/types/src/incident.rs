//! Incident records
//!
//! Raised by the subscriber when local staleness crosses the critical
//! threshold, or by the health reporter when the server judges its own
//! state degraded. Incidents are append-only on the client side, never
//! deduplicated, ordered by arrival.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioName;

/// Incident kind raised when received data ages past the critical
/// staleness threshold.
pub const KIND_STALE_DATA: &str = "stale_data";
/// Incident kind raised when process memory crosses the configured
/// threshold (the modeled resource exhaustion).
pub const KIND_MEMORY_THRESHOLD: &str = "memory_threshold_exceeded";

/// A single incident record. Field names match the `incident_alert`
/// wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "details")]
    pub detail: String,
    pub scenario: ScenarioName,
    #[serde(rename = "uptime")]
    pub uptime_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl Incident {
    pub fn new(
        kind: impl Into<String>,
        detail: impl Into<String>,
        scenario: ScenarioName,
        uptime_seconds: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
            scenario,
            uptime_seconds,
            timestamp,
        }
    }

    /// Staleness incident raised client-side.
    pub fn stale_data(
        data_age_ms: i64,
        scenario: ScenarioName,
        uptime_seconds: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            KIND_STALE_DATA,
            format!("orderbook data is {}ms old", data_age_ms),
            scenario,
            uptime_seconds,
            timestamp,
        )
    }

    /// Memory-threshold incident raised by the health reporter.
    pub fn memory_threshold(
        memory_usage_mb: f64,
        threshold_mb: f64,
        queue_depth: usize,
        scenario: ScenarioName,
        uptime_seconds: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            KIND_MEMORY_THRESHOLD,
            format!(
                "memory {:.1}MB exceeds threshold {:.1}MB (queue depth {})",
                memory_usage_mb, threshold_mb, queue_depth
            ),
            scenario,
            uptime_seconds,
            timestamp,
        )
    }
}
