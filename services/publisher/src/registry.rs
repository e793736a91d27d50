//! Connection registry: all live WebSocket subscribers
//!
//! Every broadcast goes to every registered connection; there is no
//! per-client filtering. Each connection owns an unbounded outbound
//! channel drained by its socket writer task, so one slow consumer
//! never stalls the broadcast loop. A connection whose channel is
//! gone is pruned during the broadcast that discovers it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use types::scenario::ScenarioName;
use types::wire::{ConnectionAck, WireMessage};

pub type ConnectionId = u64;

/// Frames pushed to a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A fully encoded wire frame.
    Frame(String),
    /// Graceful close; the writer sends a close frame and exits.
    Close,
}

/// Registry of live subscriber connections.
pub struct ConnectionRegistry {
    connections: Mutex<BTreeMap<ConnectionId, UnboundedSender<Outbound>>>,
    next_id: AtomicU64,
    greeting: String,
}

impl ConnectionRegistry {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            greeting: greeting.into(),
        }
    }

    /// Register a connection and immediately queue its greeting ack.
    pub fn register(
        &self,
        sender: UnboundedSender<Outbound>,
        scenario: ScenarioName,
    ) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let ack = WireMessage::ConnectionAck(ConnectionAck {
            message: self.greeting.clone(),
            scenario,
        });
        match ack.encode(Utc::now()) {
            Ok(frame) => {
                let _ = sender.send(Outbound::Frame(frame));
            }
            Err(e) => warn!(connection_id = id, error = %e, "Failed encoding greeting"),
        }

        let count = {
            let mut connections = self.lock();
            connections.insert(id, sender);
            connections.len()
        };
        info!(connection_id = id, active_clients = count, "Client connected");
        id
    }

    pub fn unregister(&self, id: ConnectionId) {
        let count = {
            let mut connections = self.lock();
            connections.remove(&id);
            connections.len()
        };
        info!(connection_id = id, active_clients = count, "Client disconnected");
    }

    /// Encode once and fan out to every live connection. Connections
    /// whose writer has gone away are pruned. Returns the number of
    /// subscribers the frame was queued for.
    pub fn broadcast(&self, message: &WireMessage) -> usize {
        let frame = match message.encode(Utc::now()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(tag = message.tag(), error = %e, "Failed encoding broadcast");
                return 0;
            }
        };

        let mut dead = Vec::new();
        let delivered = {
            let connections = self.lock();
            let mut delivered = 0;
            for (&id, sender) in connections.iter() {
                if sender.send(Outbound::Frame(frame.clone())).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(id);
                }
            }
            delivered
        };

        for id in dead {
            debug!(connection_id = id, "Pruning dead connection");
            self.unregister(id);
        }

        delivered
    }

    /// Queue a graceful close to every connection and clear the
    /// registry. Used at shutdown.
    pub fn close_all(&self) {
        let connections = {
            let mut guard = self.lock();
            std::mem::take(&mut *guard)
        };
        let count = connections.len();
        for (_, sender) in connections {
            let _ = sender.send(Outbound::Close);
        }
        if count > 0 {
            info!(closed = count, "Closed all client connections");
        }
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ConnectionId, UnboundedSender<Outbound>>> {
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use types::wire::{Classified, Envelope};

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new("Connected to MarketDataPublisher")
    }

    fn next_frame(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> String {
        match rx.try_recv().unwrap() {
            Outbound::Frame(frame) => frame,
            Outbound::Close => panic!("expected frame, got close"),
        }
    }

    #[tokio::test]
    async fn test_register_sends_greeting() {
        let registry = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(tx, ScenarioName::Burst);

        let envelope = Envelope::parse(&next_frame(&mut rx)).unwrap();
        match envelope.classify().unwrap() {
            Classified::ConnectionAck(ack) => {
                assert_eq!(ack.message, "Connected to MarketDataPublisher");
                assert_eq!(ack.scenario, ScenarioName::Burst);
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let registry = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(tx_a, ScenarioName::Stable);
        registry.register(tx_b, ScenarioName::Stable);
        next_frame(&mut rx_a);
        next_frame(&mut rx_b);

        let incident = types::incident::Incident::stale_data(
            1500,
            ScenarioName::Stable,
            2.0,
            Utc::now(),
        );
        let delivered = registry.broadcast(&WireMessage::IncidentAlert(incident));
        assert_eq!(delivered, 2);
        assert!(next_frame(&mut rx_a).contains("incident_alert"));
        assert!(next_frame(&mut rx_b).contains("incident_alert"));
    }

    #[tokio::test]
    async fn test_dead_connection_pruned() {
        let registry = registry();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        registry.register(tx_live, ScenarioName::Stable);
        registry.register(tx_dead, ScenarioName::Stable);
        drop(rx_dead);
        assert_eq!(registry.client_count(), 2);

        let incident = types::incident::Incident::stale_data(
            900,
            ScenarioName::Stable,
            1.0,
            Utc::now(),
        );
        let delivered = registry.broadcast(&WireMessage::IncidentAlert(incident));
        assert_eq!(delivered, 1);
        assert_eq!(registry.client_count(), 1);

        next_frame(&mut rx_live);
        assert!(next_frame(&mut rx_live).contains("incident_alert"));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(tx, ScenarioName::Stable);
        next_frame(&mut rx);

        registry.close_all();
        assert_eq!(registry.client_count(), 0);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = registry();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = registry.register(tx_a, ScenarioName::Stable);
        let b = registry.register(tx_b, ScenarioName::Stable);
        assert_ne!(a, b);
    }
}
