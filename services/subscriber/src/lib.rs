//! Reference subscriber client
//!
//! Connects to the publisher's WebSocket endpoint, subscribes, and
//! maintains a local view of the orderbook plus server health. The
//! client is the detection side of the system: it measures data age
//! on every update, flags stale and critically stale data, and keeps
//! an incident log. On unexpected disconnects it retries on a fixed
//! delay; a normal close (code 1000) ends the session for good.

pub mod client;
pub mod dispatch;
pub mod view;

pub const CLIENT_VERSION: &str = "0.1.0";
