//! Periodic health samples and status thresholds
//!
//! A `HealthSample` is taken fresh on every reporter tick and
//! broadcast as a heartbeat. Its `status` is a pure function of the
//! sample against fixed thresholds and is never sticky.

use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioName;

/// Overall server status carried in every heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Healthy,
    Degraded,
}

impl ServerStatus {
    /// Degraded when queue depth or processing delay exceeds its
    /// threshold, independent of the other field's value.
    pub fn evaluate(
        queue_depth: usize,
        processing_delay_ms: u64,
        thresholds: &HealthThresholds,
    ) -> Self {
        if queue_depth > thresholds.max_queue_depth
            || processing_delay_ms > thresholds.max_processing_delay_ms
        {
            ServerStatus::Degraded
        } else {
            ServerStatus::Healthy
        }
    }
}

/// Fixed thresholds for the degraded-status decision.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Queue depth above which the server reports degraded.
    pub max_queue_depth: usize,
    /// Processing delay above which the server reports degraded.
    pub max_processing_delay_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_queue_depth: 500,
            max_processing_delay_ms: 100,
        }
    }
}

/// One health report tick. Field names match the heartbeat wire
/// payload so the sample serializes directly as `heartbeat.data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub uptime_seconds: f64,
    #[serde(rename = "queue_size")]
    pub queue_depth: usize,
    pub memory_usage_mb: f64,
    #[serde(rename = "active_clients")]
    pub active_subscriber_count: usize,
    pub processing_delay_ms: u64,
    #[serde(rename = "current_scenario")]
    pub active_scenario: ScenarioName,
    #[serde(rename = "server_status")]
    pub status: ServerStatus,
}

impl HealthSample {
    /// Assemble a sample, computing `status` from the thresholds.
    #[allow(clippy::too_many_arguments)]
    pub fn take(
        uptime_seconds: f64,
        queue_depth: usize,
        memory_usage_mb: f64,
        active_subscriber_count: usize,
        processing_delay_ms: u64,
        active_scenario: ScenarioName,
        thresholds: &HealthThresholds,
    ) -> Self {
        Self {
            uptime_seconds,
            queue_depth,
            memory_usage_mb,
            active_subscriber_count,
            processing_delay_ms,
            active_scenario,
            status: ServerStatus::evaluate(queue_depth, processing_delay_ms, thresholds),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ServerStatus::Degraded
    }
}
