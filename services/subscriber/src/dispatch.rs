//! Inbound frame dispatch
//!
//! One entry point per raw frame. A frame that fails to decode is
//! counted and dropped; the connection is never torn down over a bad
//! message.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use types::wire::{Classified, Envelope};

use crate::view::ClientView;

/// What a dispatched frame turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Update,
    Heartbeat,
    Incident,
    Ack,
    Ignored,
    Dropped,
}

pub fn dispatch_frame(view: &mut ClientView, raw: &str, received_at: DateTime<Utc>) -> Dispatched {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame");
            view.counts.malformed += 1;
            return Dispatched::Dropped;
        }
    };

    match envelope.classify() {
        Ok(Classified::OrderbookUpdate(update)) => {
            view.update_orderbook(update, envelope.timestamp, received_at);
            Dispatched::Update
        }
        Ok(Classified::Heartbeat(sample)) => {
            view.update_metrics(sample);
            Dispatched::Heartbeat
        }
        Ok(Classified::IncidentAlert(incident)) => {
            view.add_incident(incident);
            Dispatched::Incident
        }
        Ok(Classified::ConnectionAck(ack)) => {
            view.apply_ack(ack);
            Dispatched::Ack
        }
        Ok(Classified::Subscribe(_)) => {
            debug!("Ignoring client-side message from server");
            Dispatched::Ignored
        }
        Ok(Classified::Unrecognized { tag }) => {
            debug!(tag = %tag, "Ignoring unrecognized message");
            view.counts.unrecognized += 1;
            Dispatched::Ignored
        }
        Err(e) => {
            warn!(error = %e, "Dropping undecodable payload");
            view.counts.malformed += 1;
            Dispatched::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FreshnessConfig;
    use types::scenario::ScenarioName;

    fn view() -> ClientView {
        ClientView::new(FreshnessConfig::default(), Utc::now())
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let mut view = view();
        assert_eq!(
            dispatch_frame(&mut view, "not json", Utc::now()),
            Dispatched::Dropped
        );
        assert_eq!(view.counts.malformed, 1);
        assert!(view.latest().is_none());
    }

    #[test]
    fn test_ack_sets_scenario() {
        let mut view = view();
        let raw = r#"{"type":"connection","data":{"message":"hi","scenario":"burst-mode"},"timestamp":"2024-02-16T12:00:00Z"}"#;
        assert_eq!(dispatch_frame(&mut view, raw, Utc::now()), Dispatched::Ack);
        assert_eq!(view.scenario(), Some(ScenarioName::Burst));
    }

    #[test]
    fn test_unrecognized_tag_ignored() {
        let mut view = view();
        let raw = r#"{"type":"echo","data":{},"timestamp":"2024-02-16T12:00:00Z"}"#;
        assert_eq!(dispatch_frame(&mut view, raw, Utc::now()), Dispatched::Ignored);
        assert_eq!(view.counts.unrecognized, 1);
    }

    #[test]
    fn test_update_dispatched() {
        let mut view = view();
        let now = Utc::now();
        let raw = format!(
            r#"{{"type":"orderbook_update","data":{{"sequence_id":1,"bids":[["119990.00","1.5"]],"asks":[["120010.00","0.8"]],"mid_price":120000.0,"spread":20.0,"timestamp":"{}","processing_time_ms":12.0,"queue_position":3}},"timestamp":"{}"}}"#,
            now.to_rfc3339(),
            now.to_rfc3339(),
        );
        assert_eq!(dispatch_frame(&mut view, &raw, now), Dispatched::Update);
        assert_eq!(view.latest().unwrap().snapshot.sequence_id, 1);
        assert_eq!(view.counts.updates, 1);
    }

    #[test]
    fn test_bad_payload_for_known_tag_dropped() {
        let mut view = view();
        let raw = r#"{"type":"heartbeat","data":{"bogus":true},"timestamp":"2024-02-16T12:00:00Z"}"#;
        assert_eq!(dispatch_frame(&mut view, raw, Utc::now()), Dispatched::Dropped);
        assert_eq!(view.counts.malformed, 1);
    }
}
