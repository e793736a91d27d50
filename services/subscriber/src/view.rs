//! Local client view: latest orderbook, health, incidents, metrics
//!
//! Data age is measured against the envelope's send timestamp on
//! every update, and against the last arrival time in between
//! (`check_silence`). A server whose queue backs up stretches the
//! gaps between arrivals, and that gap is the staleness signal this
//! client exists to surface.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use types::health::HealthSample;
use types::incident::Incident;
use types::scenario::ScenarioName;
use types::wire::{ConnectionAck, OrderbookUpdate};

/// Staleness thresholds and history bounds.
#[derive(Debug, Clone)]
pub struct FreshnessConfig {
    /// Data age above which an update counts as stale.
    pub stale_after: Duration,
    /// Data age above which an incident is raised.
    pub critical_after: Duration,
    /// Entries kept in the update and incident histories.
    pub ring_capacity: usize,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_millis(500),
            critical_after: Duration::from_millis(1000),
            ring_capacity: 200,
        }
    }
}

/// Freshness verdict for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFreshness {
    Fresh,
    Stale,
    Critical,
}

/// One remembered update: sequence, measured age, arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub sequence_id: u64,
    pub data_age_ms: i64,
    pub freshness: DataFreshness,
    pub received_at: DateTime<Utc>,
}

/// Rolling message counters, keyed by wire tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCounts {
    pub updates: u64,
    pub heartbeats: u64,
    pub incidents: u64,
    pub acks: u64,
    pub unrecognized: u64,
    pub malformed: u64,
}

pub struct ClientView {
    config: FreshnessConfig,
    latest: Option<OrderbookUpdate>,
    last_sequence: Option<u64>,
    last_update_received: Option<DateTime<Utc>>,
    health: Option<HealthSample>,
    scenario: Option<ScenarioName>,
    updates: VecDeque<UpdateRecord>,
    incidents: VecDeque<Incident>,
    pub counts: MessageCounts,
    sequence_gaps: u64,
    /// Cleared once data is fresh again so exactly one incident is
    /// raised per critical excursion.
    critical_raised: bool,
    created_at: DateTime<Utc>,
}

impl ClientView {
    pub fn new(config: FreshnessConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            config,
            latest: None,
            last_sequence: None,
            last_update_received: None,
            health: None,
            scenario: None,
            updates: VecDeque::new(),
            incidents: VecDeque::new(),
            counts: MessageCounts::default(),
            sequence_gaps: 0,
            critical_raised: false,
            created_at,
        }
    }

    fn classify_age(&self, age: chrono::Duration) -> DataFreshness {
        let age = age.to_std().unwrap_or(Duration::ZERO);
        if age > self.config.critical_after {
            DataFreshness::Critical
        } else if age > self.config.stale_after {
            DataFreshness::Stale
        } else {
            DataFreshness::Fresh
        }
    }

    fn uptime_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// Apply an orderbook update, measuring its age from the
    /// envelope's send time to receipt. Crossing the critical
    /// threshold raises exactly one local incident until data turns
    /// fresh again.
    pub fn update_orderbook(
        &mut self,
        update: OrderbookUpdate,
        sent_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) -> DataFreshness {
        let age = received_at - sent_at;
        let freshness = self.classify_age(age);

        if let Some(last) = self.last_sequence {
            if update.snapshot.sequence_id > last + 1 {
                self.sequence_gaps += update.snapshot.sequence_id - last - 1;
            }
        }
        self.last_sequence = Some(update.snapshot.sequence_id);

        self.push_record(UpdateRecord {
            sequence_id: update.snapshot.sequence_id,
            data_age_ms: age.num_milliseconds(),
            freshness,
            received_at,
        });

        match freshness {
            DataFreshness::Critical => {
                if !self.critical_raised {
                    self.critical_raised = true;
                    let incident = Incident::stale_data(
                        age.num_milliseconds(),
                        self.scenario.unwrap_or(ScenarioName::Stable),
                        self.uptime_seconds(received_at),
                        received_at,
                    );
                    warn!(
                        data_age_ms = age.num_milliseconds(),
                        sequence_id = update.snapshot.sequence_id,
                        "Critically stale data"
                    );
                    self.push_incident(incident);
                }
            }
            DataFreshness::Fresh => self.critical_raised = false,
            DataFreshness::Stale => {}
        }

        self.last_update_received = Some(received_at);
        self.latest = Some(update);
        self.counts.updates += 1;
        freshness
    }

    /// Silence check: how fresh is the view when no update arrives at
    /// all. A critically long gap raises an incident under the same
    /// one-per-excursion rule as update ages.
    pub fn check_silence(&mut self, now: DateTime<Utc>) -> DataFreshness {
        let Some(last) = self.last_update_received else {
            return DataFreshness::Fresh;
        };
        let gap = now - last;
        let freshness = self.classify_age(gap);

        if freshness == DataFreshness::Critical && !self.critical_raised {
            self.critical_raised = true;
            let incident = Incident::stale_data(
                gap.num_milliseconds(),
                self.scenario.unwrap_or(ScenarioName::Stable),
                self.uptime_seconds(now),
                now,
            );
            warn!(gap_ms = gap.num_milliseconds(), "No data received");
            self.push_incident(incident);
        }
        freshness
    }

    pub fn apply_ack(&mut self, ack: ConnectionAck) {
        info!(scenario = %ack.scenario, message = %ack.message, "Connection acknowledged");
        self.scenario = Some(ack.scenario);
        self.counts.acks += 1;
    }

    pub fn update_metrics(&mut self, sample: HealthSample) {
        if sample.is_degraded() {
            warn!(
                queue_size = sample.queue_depth,
                processing_delay_ms = sample.processing_delay_ms,
                "Server reports degraded"
            );
        }
        self.scenario = Some(sample.active_scenario);
        self.health = Some(sample);
        self.counts.heartbeats += 1;
    }

    /// Record a server-raised incident. Incidents are append-only and
    /// never deduplicated.
    pub fn add_incident(&mut self, incident: Incident) {
        warn!(kind = %incident.kind, details = %incident.detail, "Incident alert");
        self.push_incident(incident);
        self.counts.incidents += 1;
    }

    fn push_record(&mut self, record: UpdateRecord) {
        if self.updates.len() >= self.config.ring_capacity {
            self.updates.pop_front();
        }
        self.updates.push_back(record);
    }

    fn push_incident(&mut self, incident: Incident) {
        if self.incidents.len() >= self.config.ring_capacity {
            self.incidents.pop_front();
        }
        self.incidents.push_back(incident);
    }

    pub fn latest(&self) -> Option<&OrderbookUpdate> {
        self.latest.as_ref()
    }

    pub fn health(&self) -> Option<&HealthSample> {
        self.health.as_ref()
    }

    pub fn scenario(&self) -> Option<ScenarioName> {
        self.scenario
    }

    pub fn incidents(&self) -> impl Iterator<Item = &Incident> {
        self.incidents.iter()
    }

    pub fn recent_updates(&self) -> impl Iterator<Item = &UpdateRecord> {
        self.updates.iter()
    }

    pub fn sequence_gaps(&self) -> u64 {
        self.sequence_gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use types::snapshot::{BookLevel, Snapshot};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 16, 12, 0, 0).unwrap()
    }

    fn update(sequence_id: u64, produced_at: DateTime<Utc>) -> OrderbookUpdate {
        OrderbookUpdate {
            snapshot: Snapshot::from_levels(
                sequence_id,
                vec![BookLevel::new(Decimal::new(11999000, 2), Decimal::ONE)],
                vec![BookLevel::new(Decimal::new(12001000, 2), Decimal::ONE)],
                produced_at,
            ),
            processing_time_ms: 10.0,
            queue_position: 0,
        }
    }

    fn view() -> ClientView {
        ClientView::new(FreshnessConfig::default(), base_time())
    }

    #[test]
    fn test_fresh_update() {
        let mut view = view();
        let now = base_time();
        let freshness = view.update_orderbook(update(1, now), now, now + chrono::Duration::milliseconds(100));
        assert_eq!(freshness, DataFreshness::Fresh);
        assert_eq!(view.incidents().count(), 0);
    }

    #[test]
    fn test_stale_update_no_incident() {
        let mut view = view();
        let now = base_time();
        let freshness = view.update_orderbook(update(1, now), now, now + chrono::Duration::milliseconds(700));
        assert_eq!(freshness, DataFreshness::Stale);
        assert_eq!(view.incidents().count(), 0);
    }

    #[test]
    fn test_critical_update_raises_one_incident() {
        let mut view = view();
        let now = base_time();
        for seq in 1..=5 {
            let freshness = view.update_orderbook(
                update(seq, now),
                now,
                now + chrono::Duration::milliseconds(1500 + seq as i64),
            );
            assert_eq!(freshness, DataFreshness::Critical);
        }
        // Five critical updates, one incident
        assert_eq!(view.incidents().count(), 1);
        assert_eq!(view.incidents().next().unwrap().kind, "stale_data");
    }

    #[test]
    fn test_critical_rearms_after_fresh() {
        let mut view = view();
        let now = base_time();
        view.update_orderbook(update(1, now), now, now + chrono::Duration::milliseconds(1500));
        view.update_orderbook(
            update(2, now + chrono::Duration::milliseconds(1600)),
            now + chrono::Duration::milliseconds(1600),
            now + chrono::Duration::milliseconds(1700),
        );
        view.update_orderbook(
            update(3, now + chrono::Duration::milliseconds(1800)),
            now + chrono::Duration::milliseconds(1800),
            now + chrono::Duration::milliseconds(3300),
        );
        assert_eq!(view.incidents().count(), 2);
    }

    #[test]
    fn test_silence_detection() {
        let mut view = view();
        let now = base_time();
        view.update_orderbook(update(1, now), now, now);
        assert_eq!(view.check_silence(now + chrono::Duration::milliseconds(200)), DataFreshness::Fresh);
        assert_eq!(view.check_silence(now + chrono::Duration::milliseconds(700)), DataFreshness::Stale);
        assert_eq!(
            view.check_silence(now + chrono::Duration::milliseconds(1200)),
            DataFreshness::Critical
        );
        // Repeated silence checks do not duplicate the incident
        view.check_silence(now + chrono::Duration::milliseconds(1300));
        assert_eq!(view.incidents().count(), 1);
    }

    #[test]
    fn test_silence_before_any_data_is_fresh() {
        let mut view = view();
        assert_eq!(view.check_silence(base_time()), DataFreshness::Fresh);
    }

    #[test]
    fn test_sequence_gap_counting() {
        let mut view = view();
        let now = base_time();
        view.update_orderbook(update(1, now), now, now);
        view.update_orderbook(update(2, now), now, now);
        view.update_orderbook(update(5, now), now, now);
        assert_eq!(view.sequence_gaps(), 2);
    }

    #[test]
    fn test_ring_capacity_bounds_history() {
        let mut view = ClientView::new(
            FreshnessConfig {
                ring_capacity: 3,
                ..FreshnessConfig::default()
            },
            base_time(),
        );
        let now = base_time();
        for seq in 1..=10 {
            view.update_orderbook(update(seq, now), now, now);
        }
        assert_eq!(view.recent_updates().count(), 3);
        assert_eq!(view.recent_updates().next().unwrap().sequence_id, 8);
    }

    #[test]
    fn test_heartbeat_updates_scenario_and_health() {
        let mut view = view();
        let sample = HealthSample::take(
            5.0,
            42,
            80.0,
            2,
            100,
            ScenarioName::Burst,
            &types::health::HealthThresholds::default(),
        );
        view.update_metrics(sample);
        assert_eq!(view.scenario(), Some(ScenarioName::Burst));
        assert_eq!(view.health().unwrap().queue_depth, 42);
        assert_eq!(view.counts.heartbeats, 1);
    }

    #[test]
    fn test_server_incidents_never_deduplicated() {
        let mut view = view();
        let incident = Incident::memory_threshold(
            180.0,
            150.0,
            4000,
            ScenarioName::ExtremeSpike,
            60.0,
            base_time(),
        );
        view.add_incident(incident.clone());
        view.add_incident(incident);
        assert_eq!(view.incidents().count(), 2);
    }
}
