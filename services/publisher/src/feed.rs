//! Scenario feed: scripted snapshot replay
//!
//! Pulls ordered fixture updates, assigns monotonic sequence ids and
//! production timestamps, and draws each inter-arrival delay from the
//! active phase's interval bounds with a seeded RNG, so a fixed seed
//! reproduces the exact delay trajectory. The feed is lazy and finite
//! and is not restartable in place: reactivating a scenario builds a
//! fresh feed with reset phase and sequence state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};
use types::scenario::ScenarioName;
use types::snapshot::Snapshot;

use crate::config::PublisherConfig;
use crate::fixtures::{FixtureSource, ScenarioFixture};
use crate::queue::ProcessingQueue;
use crate::scenario::ScenarioController;

/// Replay progress, exposed on the simulation status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedProgress {
    pub scenario: ScenarioName,
    pub current_index: usize,
    pub total_updates: usize,
    pub progress_percent: f64,
    pub remaining_updates: usize,
}

/// An update drawn from the feed but not yet released: sequence id
/// assigned, timestamp deferred until the inter-arrival delay has
/// passed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    sequence_id: u64,
    bids: Vec<types::snapshot::BookLevel>,
    asks: Vec<types::snapshot::BookLevel>,
}

impl PendingSnapshot {
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Finalize the snapshot at its release time.
    pub fn stamp(self, produced_at: DateTime<Utc>) -> Snapshot {
        Snapshot::from_levels(self.sequence_id, self.bids, self.asks, produced_at)
    }
}

/// Scripted producer for one scenario activation.
pub struct ScenarioFeed {
    fixture: ScenarioFixture,
    rng: ChaCha8Rng,
    cursor: usize,
    next_sequence: u64,
    /// Accumulated scripted delay; drives phase selection.
    elapsed_ms: u64,
    top_levels: usize,
}

impl ScenarioFeed {
    pub fn new(fixture: ScenarioFixture, seed: u64, top_levels: usize) -> Self {
        info!(
            scenario = %fixture.spec.name,
            updates = fixture.updates.len(),
            seed,
            "Scenario feed activated"
        );
        Self {
            fixture,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cursor: 0,
            next_sequence: 1,
            elapsed_ms: 0,
            top_levels,
        }
    }

    pub fn scenario(&self) -> ScenarioName {
        self.fixture.spec.name
    }

    /// Pull the next (inter-arrival delay, pending snapshot) pair, or
    /// `None` at end-of-scenario (updates or scripted phases
    /// exhausted). The caller stamps the snapshot once the delay has
    /// actually elapsed, so `produced_at` marks the moment it leaves
    /// the feed rather than the moment it was drawn.
    pub fn next(&mut self) -> Option<(Duration, PendingSnapshot)> {
        let update = self.fixture.updates.get(self.cursor)?;
        let (_, phase) = self.fixture.spec.phase_at(self.elapsed_ms)?;

        let delay_ms = if phase.interval.min >= phase.interval.max {
            phase.interval.min
        } else {
            self.rng.gen_range(phase.interval.min..=phase.interval.max)
        };

        let pending = PendingSnapshot {
            sequence_id: self.next_sequence,
            bids: update.bids.iter().take(self.top_levels).cloned().collect(),
            asks: update.asks.iter().take(self.top_levels).cloned().collect(),
        };

        self.cursor += 1;
        self.next_sequence += 1;
        self.elapsed_ms += delay_ms;

        debug!(
            sequence_id = pending.sequence_id,
            delay_ms,
            elapsed_ms = self.elapsed_ms,
            "Feed drew next update"
        );

        Some((Duration::from_millis(delay_ms), pending))
    }

    pub fn progress(&self) -> FeedProgress {
        let total = self.fixture.updates.len();
        FeedProgress {
            scenario: self.fixture.spec.name,
            current_index: self.cursor,
            total_updates: total,
            progress_percent: if total > 0 {
                (self.cursor as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            remaining_updates: total.saturating_sub(self.cursor),
        }
    }
}

/// The feed-pull-and-enqueue loop.
///
/// Runs until the scenario's updates are exhausted or `running` is
/// cleared. A scenario switch on the controller takes effect on the
/// next pull: the loop rebuilds the feed, resetting phase, elapsed
/// and sequence state.
pub async fn run_replay(
    fixtures: Arc<dyn FixtureSource>,
    queue: Arc<ProcessingQueue>,
    controller: Arc<ScenarioController>,
    config: Arc<PublisherConfig>,
    running: Arc<AtomicBool>,
    progress: Arc<std::sync::Mutex<Option<FeedProgress>>>,
) {
    'activation: while running.load(Ordering::SeqCst) {
        let scenario = controller.active();
        let generation = controller.generation();

        let fixture = match fixtures.fixture(scenario) {
            Ok(fixture) => fixture,
            Err(e) => {
                tracing::error!(scenario = %scenario, error = %e, "Cannot replay scenario");
                break;
            }
        };

        let mut feed = ScenarioFeed::new(fixture, config.feed_seed, config.top_levels);

        loop {
            if !running.load(Ordering::SeqCst) {
                break 'activation;
            }
            // Switch takes effect here, on the pull
            if controller.generation() != generation {
                info!(
                    from = %scenario,
                    to = %controller.active(),
                    "Scenario switched; restarting feed"
                );
                continue 'activation;
            }

            match feed.next() {
                Some((delay, pending)) => {
                    tokio::time::sleep(delay).await;
                    // Stamped after the delay so produced_at is the
                    // release moment, not the draw moment
                    queue.enqueue(pending.stamp(Utc::now()), Utc::now());
                    if let Ok(mut slot) = progress.lock() {
                        *slot = Some(feed.progress());
                    }
                }
                None => {
                    info!(scenario = %scenario, "Scenario replay completed");
                    break 'activation;
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}
