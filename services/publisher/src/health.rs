//! Health reporter
//!
//! Takes a fresh sample every heartbeat interval and broadcasts it to
//! all subscribers, regardless of the status it carries. The sampled
//! queue depth and delay come from whatever is live at tick time, so
//! status flaps back to healthy as soon as the numbers recover.
//!
//! Memory incidents are edge-triggered: one alert per excursion above
//! the threshold, re-armed once usage falls back below it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use types::health::HealthSample;
use types::incident::Incident;
use types::wire::WireMessage;

use crate::config::PublisherConfig;
use crate::memory::MemoryProbe;
use crate::queue::ProcessingQueue;
use crate::registry::ConnectionRegistry;
use crate::scenario::ScenarioController;

/// Latest sample, shared with the HTTP status handlers.
pub type SharedSample = Arc<Mutex<Option<HealthSample>>>;

/// Edge detector for the memory threshold.
pub struct MemoryAlarm {
    armed: bool,
}

impl MemoryAlarm {
    pub fn new() -> Self {
        Self { armed: true }
    }

    /// True exactly once per excursion above the threshold; re-arms
    /// when usage drops back to or below it.
    pub fn check(&mut self, usage_mb: f64, threshold_mb: f64) -> bool {
        if usage_mb > threshold_mb {
            let fire = self.armed;
            self.armed = false;
            fire
        } else {
            self.armed = true;
            false
        }
    }
}

impl Default for MemoryAlarm {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HealthReporter {
    config: Arc<PublisherConfig>,
    queue: Arc<ProcessingQueue>,
    registry: Arc<ConnectionRegistry>,
    controller: Arc<ScenarioController>,
    last_sample: SharedSample,
    started_at: Instant,
    probe: MemoryProbe,
    alarm: MemoryAlarm,
}

impl HealthReporter {
    pub fn new(
        config: Arc<PublisherConfig>,
        queue: Arc<ProcessingQueue>,
        registry: Arc<ConnectionRegistry>,
        controller: Arc<ScenarioController>,
        last_sample: SharedSample,
        started_at: Instant,
    ) -> Self {
        Self {
            config,
            queue,
            registry,
            controller,
            last_sample,
            started_at,
            probe: MemoryProbe::new(),
            alarm: MemoryAlarm::new(),
        }
    }

    /// Tick every heartbeat interval until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.config.heartbeat_interval, "Health reporter started");
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick of a tokio interval fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.changed() => {
                    info!("Health reporter stopped");
                    break;
                }
            }
        }
    }

    fn tick(&mut self) {
        let scenario = self.controller.active();
        let memory_usage_mb = self.probe.usage_mb();
        let sample = HealthSample::take(
            self.started_at.elapsed().as_secs_f64(),
            self.queue.depth(),
            memory_usage_mb,
            self.registry.client_count(),
            self.config.delay_for(scenario),
            scenario,
            &self.config.health,
        );

        if sample.is_degraded() {
            warn!(
                queue_depth = sample.queue_depth,
                processing_delay_ms = sample.processing_delay_ms,
                "Server degraded"
            );
        }

        self.registry
            .broadcast(&WireMessage::Heartbeat(sample.clone()));

        if self
            .alarm
            .check(memory_usage_mb, self.config.memory_threshold_mb)
        {
            let incident = Incident::memory_threshold(
                memory_usage_mb,
                self.config.memory_threshold_mb,
                sample.queue_depth,
                scenario,
                sample.uptime_seconds,
                Utc::now(),
            );
            warn!(
                memory_usage_mb,
                threshold_mb = self.config.memory_threshold_mb,
                "Memory threshold exceeded"
            );
            self.registry
                .broadcast(&WireMessage::IncidentAlert(incident));
        }

        if let Ok(mut slot) = self.last_sample.lock() {
            *slot = Some(sample);
        }
    }
}
