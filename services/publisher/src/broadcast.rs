//! Broadcast engine: the deliberately slow consumer
//!
//! Dequeues one entry at a time, sleeps for the active scenario's
//! artificial processing delay, then fans the update out to every
//! registered subscriber. The delay is applied per message with no
//! batching, so a producer running faster than the delay allows
//! builds queue backlog by construction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};
use types::wire::{OrderbookUpdate, WireMessage};

use crate::config::PublisherConfig;
use crate::queue::{ProcessingQueue, QueueEntry};
use crate::registry::ConnectionRegistry;
use crate::scenario::ScenarioController;

/// Log a metrics line every this many published updates.
const METRICS_EVERY: u64 = 50;

pub struct BroadcastEngine {
    config: Arc<PublisherConfig>,
    queue: Arc<ProcessingQueue>,
    registry: Arc<ConnectionRegistry>,
    controller: Arc<ScenarioController>,
    published: u64,
}

impl BroadcastEngine {
    pub fn new(
        config: Arc<PublisherConfig>,
        queue: Arc<ProcessingQueue>,
        registry: Arc<ConnectionRegistry>,
        controller: Arc<ScenarioController>,
    ) -> Self {
        Self {
            config,
            queue,
            registry,
            controller,
            published: 0,
        }
    }

    /// Drain the queue until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Broadcast engine started");
        let queue = Arc::clone(&self.queue);
        loop {
            tokio::select! {
                entry = queue.dequeue() => self.process(entry).await,
                _ = shutdown.changed() => {
                    info!(published = self.published, "Broadcast engine stopped");
                    break;
                }
            }
        }
    }

    async fn process(&mut self, entry: QueueEntry) {
        let started = Instant::now();
        let scenario = self.controller.active();
        let delay_ms = self.config.delay_for(scenario);

        // The artificial bottleneck
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let queue_position = self.queue.depth();
        let waited_ms = (Utc::now() - entry.enqueued_at).num_milliseconds();
        let update = OrderbookUpdate {
            snapshot: entry.snapshot,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            queue_position,
        };
        let sequence_id = update.snapshot.sequence_id;

        let delivered = self
            .registry
            .broadcast(&WireMessage::OrderbookUpdate(update));
        self.published += 1;

        debug!(
            sequence_id,
            waited_ms,
            queue_depth = queue_position,
            delivered,
            "Published orderbook update"
        );

        if self.published % METRICS_EVERY == 0 {
            info!(
                published = self.published,
                queue_depth = queue_position,
                subscribers = delivered,
                scenario = %scenario,
                delay_ms,
                "Broadcast metrics"
            );
        }
    }
}
