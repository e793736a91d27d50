//! Market Data Publisher Service
//!
//! Replays scripted market-depth scenarios to WebSocket subscribers
//! while deliberately modeling a degrading backend:
//! - An unbounded processing queue (the modeled "leak")
//! - An artificial per-message processing delay
//! - A periodic health report subscribers use to detect staleness
//!
//! # Architecture
//!
//! ```text
//! Scenario Feed (fixtures + seeded delays)
//!        │
//!    ┌───▼────────┐
//!    │ Processing │  ← unbounded FIFO; backlog is the incident signal
//!    │   Queue    │
//!    └───┬────────┘
//!        │
//!    ┌───▼────────┐      ┌──────────────┐
//!    │ Broadcast  │      │   Health     │
//!    │  Engine    │      │  Reporter    │
//!    └───┬────────┘      └──────┬───────┘
//!        │  orderbook_update    │ heartbeat / incident_alert
//!    ┌───▼───────────────────── ▼──┐
//!    │     Connection Registry     │
//!    └─────────────────────────────┘
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod feed;
pub mod fixtures;
pub mod handlers;
pub mod health;
pub mod memory;
pub mod queue;
pub mod registry;
pub mod router;
pub mod scenario;
pub mod state;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
