//! Depth-of-book snapshot types
//!
//! A `Snapshot` is one point-in-time record of the top N bid/ask
//! levels, immutable once produced by the scenario feed. Levels are
//! kept as `rust_decimal` pairs and serialize as string pairs on the
//! wire (`["120000.50", "1.2500"]`), matching the fixture format.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level: (price, quantity).
///
/// Serializes as a two-element array of decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel(pub Decimal, pub Decimal);

impl BookLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self(price, quantity)
    }

    pub fn price(&self) -> Decimal {
        self.0
    }

    pub fn quantity(&self) -> Decimal {
        self.1
    }
}

/// A point-in-time depth-of-book record.
///
/// `sequence_id` is assigned by the feed at production time and is
/// monotonically increasing and gapless within a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic sequence number assigned at production time.
    pub sequence_id: u64,
    /// Bid levels in descending price order (best first).
    pub bids: Vec<BookLevel>,
    /// Ask levels in ascending price order (best first).
    pub asks: Vec<BookLevel>,
    /// Midpoint between best bid and best ask.
    pub mid_price: f64,
    /// Best ask minus best bid.
    pub spread: f64,
    /// Timestamp set when the snapshot left the feed.
    #[serde(rename = "timestamp")]
    pub produced_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from raw levels, deriving mid price and spread
    /// from the best bid and ask.
    pub fn from_levels(
        sequence_id: u64,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        produced_at: DateTime<Utc>,
    ) -> Self {
        let (mid_price, spread) = derive_prices(&bids, &asks);
        Self {
            sequence_id,
            bids,
            asks,
            mid_price,
            spread,
            produced_at,
        }
    }

    /// Best (highest) bid level, if any.
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    /// Best (lowest) ask level, if any.
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Structural validity check: both sides populated, bids strictly
    /// descending, asks strictly ascending, non-negative spread.
    pub fn is_well_formed(&self) -> bool {
        if self.bids.is_empty() || self.asks.is_empty() {
            return false;
        }
        if !self.bids.windows(2).all(|w| w[0].price() > w[1].price()) {
            return false;
        }
        if !self.asks.windows(2).all(|w| w[0].price() < w[1].price()) {
            return false;
        }
        self.spread >= 0.0
    }
}

/// Derive (mid_price, spread) from the best levels of each side.
///
/// Returns (0.0, 0.0) when either side is empty.
pub fn derive_prices(bids: &[BookLevel], asks: &[BookLevel]) -> (f64, f64) {
    match (bids.first(), asks.first()) {
        (Some(bid), Some(ask)) => {
            let best_bid = bid.price().to_f64().unwrap_or(0.0);
            let best_ask = ask.price().to_f64().unwrap_or(0.0);
            ((best_bid + best_ask) / 2.0, best_ask - best_bid)
        }
        _ => (0.0, 0.0),
    }
}
