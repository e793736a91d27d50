//! Processing queue between the scenario feed and the broadcast engine
//!
//! FIFO with no backpressure: enqueue never blocks and never fails.
//! Left uncapped (the default) the backlog grows without limit when
//! the producer outpaces the consumer, which is exactly the condition
//! the service exists to reproduce. An optional cap switches to
//! drop-oldest for deployments that need a bound.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::debug;
use types::snapshot::Snapshot;

/// One queued snapshot plus its enqueue time, kept so the engine can
/// report time-in-queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub snapshot: Snapshot,
    pub enqueued_at: DateTime<Utc>,
}

/// Unbounded (by default) FIFO shared between feed and engine.
pub struct ProcessingQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
    depth: AtomicUsize,
    cap: Option<usize>,
    dropped_oldest: AtomicU64,
}

impl ProcessingQueue {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            depth: AtomicUsize::new(0),
            cap,
            dropped_oldest: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Append a snapshot. Never blocks; with a cap in place the oldest
    /// entry is evicted to make room.
    pub fn enqueue(&self, snapshot: Snapshot, enqueued_at: DateTime<Utc>) {
        let depth = {
            let mut entries = match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(cap) = self.cap {
                while entries.len() >= cap {
                    entries.pop_front();
                    self.dropped_oldest.fetch_add(1, Ordering::Relaxed);
                }
            }
            entries.push_back(QueueEntry {
                snapshot,
                enqueued_at,
            });
            // Published while the lock is held so depth() never races
            // ahead of the entries it counts
            let depth = entries.len();
            self.depth.store(depth, Ordering::SeqCst);
            depth
        };
        self.notify.notify_one();
        debug!(depth, "Enqueued snapshot");
    }

    /// Remove the head entry, waiting if the queue is empty.
    pub async fn dequeue(&self) -> QueueEntry {
        loop {
            // Arm before checking so a concurrent enqueue between the
            // check and the await cannot be missed
            let notified = self.notify.notified();
            if let Some(entry) = self.try_dequeue() {
                return entry;
            }
            notified.await;
        }
    }

    /// Non-blocking dequeue.
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.pop_front();
        self.depth.store(entries.len(), Ordering::SeqCst);
        entry
    }

    /// Current backlog depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Entries evicted by the cap since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped_oldest.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use types::snapshot::{BookLevel, Snapshot};
    use rust_decimal::Decimal;

    fn snapshot(sequence_id: u64) -> Snapshot {
        Snapshot::from_levels(
            sequence_id,
            vec![BookLevel::new(Decimal::new(11999000, 2), Decimal::ONE)],
            vec![BookLevel::new(Decimal::new(12001000, 2), Decimal::ONE)],
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = ProcessingQueue::unbounded();
        for id in 1..=3 {
            queue.enqueue(snapshot(id), Utc::now());
        }
        assert_eq!(queue.depth(), 3);

        for expected in 1..=3 {
            let entry = queue.dequeue().await;
            assert_eq!(entry.snapshot.sequence_id, expected);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(ProcessingQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(snapshot(42), Utc::now());

        let entry = consumer.await.unwrap();
        assert_eq!(entry.snapshot.sequence_id, 42);
    }

    #[tokio::test]
    async fn test_unbounded_growth() {
        let queue = ProcessingQueue::unbounded();
        for id in 0..10_000 {
            queue.enqueue(snapshot(id), Utc::now());
        }
        assert_eq!(queue.depth(), 10_000);
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn test_cap_drops_oldest() {
        let queue = ProcessingQueue::new(Some(3));
        for id in 1..=5 {
            queue.enqueue(snapshot(id), Utc::now());
        }
        assert_eq!(queue.depth(), 3);
        assert_eq!(queue.dropped(), 2);
        // Oldest two were evicted
        assert_eq!(queue.dequeue().await.snapshot.sequence_id, 3);
    }

    #[tokio::test]
    async fn test_try_dequeue_empty() {
        let queue = ProcessingQueue::unbounded();
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_depth_tracks_entries_under_concurrency() {
        let queue = Arc::new(ProcessingQueue::unbounded());

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for id in 0..1000 {
                    queue.enqueue(snapshot(id), Utc::now());
                }
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut consumed = 0usize;
                while consumed < 500 {
                    if queue.try_dequeue().is_some() {
                        consumed += 1;
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
                consumed
            })
        };

        producer.await.unwrap();
        let consumed = consumer.await.unwrap();
        assert_eq!(queue.depth(), 1000 - consumed);
    }
}
