//! Connection lifecycle: connect, subscribe, read, reconnect
//!
//! Reconnects on a fixed delay after any abnormal end of session. A
//! normal close (code 1000) means the server is done with us and the
//! client exits instead of retrying.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use types::wire::{encode_subscribe, SubscribeRequest};
use uuid::Uuid;

use crate::dispatch::dispatch_frame;
use crate::view::ClientView;

pub type SharedView = Arc<Mutex<ClientView>>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub client_id: String,
    /// Fixed pause between reconnect attempts.
    pub reconnect_delay: Duration,
    /// How often the silence watchdog re-checks data age.
    pub watchdog_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            client_id: format!("subscriber-{}", Uuid::new_v4()),
            reconnect_delay: Duration::from_secs(3),
            watchdog_interval: Duration::from_millis(500),
        }
    }
}

/// Normal close ends the session for good; everything else retries.
pub fn should_reconnect(close_code: Option<u16>) -> bool {
    close_code != Some(1000)
}

/// Run the client until the server closes normally or shutdown is
/// signalled.
pub async fn run(config: ClientConfig, view: SharedView, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match connect_async(config.url.as_str()).await {
            Ok((socket, _)) => {
                info!(url = %config.url, "Connected");
                let close_code = session(socket, &config, &view, &mut shutdown).await;
                if !should_reconnect(close_code) {
                    info!("Session closed normally; exiting");
                    return;
                }
                warn!(?close_code, "Connection lost");
            }
            Err(e) => warn!(url = %config.url, error = %e, "Connect failed"),
        }

        info!(delay = ?config.reconnect_delay, "Reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// One connected session. Returns the close code if the server closed
/// the socket, `None` on error or silent drop.
async fn session(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &ClientConfig,
    view: &SharedView,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<u16> {
    let (mut sink, mut stream) = socket.split();

    let request = SubscribeRequest {
        client_id: config.client_id.clone(),
        timestamp: Utc::now(),
    };
    match encode_subscribe(&request, Utc::now()) {
        Ok(frame) => {
            if sink.send(Message::Text(frame)).await.is_err() {
                return None;
            }
        }
        Err(e) => warn!(error = %e, "Failed encoding subscribe"),
    }

    let mut watchdog = tokio::time::interval(config.watchdog_interval);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(mut view) = view.lock() {
                        dispatch_frame(&mut view, &text, Utc::now());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return frame.map(|f| f.code.into());
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Socket read error");
                    return None;
                }
                None => return None,
            },
            _ = watchdog.tick() => {
                if let Ok(mut view) = view.lock() {
                    view.check_silence(Utc::now());
                }
            }
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Some(1000);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_close_is_final() {
        assert!(!should_reconnect(Some(1000)));
    }

    #[test]
    fn test_abnormal_codes_reconnect() {
        assert!(should_reconnect(Some(1001)));
        assert!(should_reconnect(Some(1006)));
        assert!(should_reconnect(Some(1011)));
    }

    #[test]
    fn test_silent_drop_reconnects() {
        assert!(should_reconnect(None));
    }
}
