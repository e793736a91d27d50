//! Types library for the market data publisher
//!
//! This library provides all core type definitions shared between the
//! publisher service and subscriber clients, ensuring both sides agree
//! on the data model and the wire format.
//!
//! # Modules
//! - `snapshot`: Depth-of-book snapshot types (BookLevel, Snapshot)
//! - `scenario`: Named replay scenarios and their timed phases
//! - `health`: Periodic health samples and status thresholds
//! - `incident`: Incident records raised by server or client
//! - `wire`: WebSocket message envelope and tagged payloads
//! - `errors`: Error taxonomy

pub mod errors;
pub mod health;
pub mod incident;
pub mod scenario;
pub mod snapshot;
pub mod wire;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::health::*;
    pub use crate::incident::*;
    pub use crate::scenario::*;
    pub use crate::snapshot::*;
    pub use crate::wire::*;
}
