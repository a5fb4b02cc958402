//! Push event hub with auto-reconnect.
//!
//! Connects to the backend's event socket and streams parsed [`Frame`]s
//! through a [`tokio::sync::broadcast`] channel. Handles reconnection with
//! exponential backoff + jitter automatically.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_api::websocket::{EventHub, ReconnectConfig, ws_url};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = ws_url(&"http://127.0.0.1:8082".parse()?, "api/events")?;
//!
//! let hub = EventHub::connect(url, ReconnectConfig::default(), cancel.clone(), None);
//! let mut rx = hub.subscribe_frames();
//!
//! while let Ok(frame) = rx.recv().await {
//!     println!("{} {}", frame.action, frame.subject);
//! }
//!
//! hub.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::HeaderValue;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::event::Frame;

// ── Broadcast channel capacity ───────────────────────────────────────

const FRAME_CHANNEL_CAPACITY: usize = 1024;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Derive the socket URL from the backend base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`; `path` is appended.
pub fn ws_url(base: &Url, path: &str) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let rest = base
        .as_str()
        .split_once("://")
        .map_or(base.as_str(), |(_, rest)| rest)
        .trim_end_matches('/');
    let path = path.trim_matches('/');
    Ok(Url::parse(&format!("{scheme}://{rest}/{path}"))?)
}

// ── EventHub ─────────────────────────────────────────────────────────

/// Handle to a running push event stream.
///
/// Cloning shares the same broadcast channel and background task.
/// Call [`shutdown`](Self::shutdown) to tear the connection down.
#[derive(Debug, Clone)]
pub struct EventHub {
    frame_tx: broadcast::Sender<Arc<Frame>>,
    cancel: CancellationToken,
}

impl EventHub {
    /// Spawn the reconnection loop for `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens on the
    /// background task. Must be called from within a Tokio runtime.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        authorization: Option<HeaderValue>,
    ) -> Self {
        let hub = Self::detached(cancel);

        let frame_tx = hub.frame_tx.clone();
        let task_cancel = hub.cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, frame_tx, reconnect, task_cancel, authorization).await;
        });

        hub
    }

    /// A hub with no socket behind it. Frames arrive only via
    /// [`publish`](Self::publish).
    pub fn detached(cancel: CancellationToken) -> Self {
        let (frame_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self { frame_tx, cancel }
    }

    /// Get a new receiver for every frame published from now on.
    ///
    /// A receiver that falls behind gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe_frames(&self) -> broadcast::Receiver<Arc<Frame>> {
        self.frame_tx.subscribe()
    }

    /// Inject a frame locally, as if the backend had pushed it.
    pub fn publish(&self, frame: Frame) {
        let _ = self.frame_tx.send(Arc::new(frame));
    }

    /// Token cancelled on shutdown; subscription tasks derive children from it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    frame_tx: broadcast::Sender<Arc<Frame>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    authorization: Option<HeaderValue>,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &frame_tx, &cancel, authorization.as_ref()) => {
                match result {
                    Ok(()) => {
                        tracing::info!("event socket disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event socket error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event socket reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("event socket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single socket connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    frame_tx: &broadcast::Sender<Arc<Frame>>,
    cancel: &CancellationToken,
    authorization: Option<&HeaderValue>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = authorization {
        let value = value
            .to_str()
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        request = request.with_header("Authorization", value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("event socket connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            message = read.next() => {
                match message {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, frame_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        tracing::trace!("event socket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(close))) => {
                        return match close {
                            Some(cf) if cf.code != CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: u16::from(cf.code),
                                    reason: cf.reason.to_string(),
                                })
                            }
                            _ => Ok(()),
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("event socket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text message and broadcast the subscription frame inside.
///
/// The same socket also carries notifications that are not endpoint
/// frames (e.g. `{"type": "devices", ...}`); those are skipped.
fn parse_and_broadcast(text: &str, frame_tx: &broadcast::Sender<Arc<Frame>>) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse socket message");
            return;
        }
    };

    if value.get("subject").is_none() || value.get("action").is_none() {
        tracing::trace!("skipping non-subscription message");
        return;
    }

    match serde_json::from_value::<Frame>(value) {
        Ok(frame) => {
            // Ignore send errors -- just means no active subscribers right now
            let _ = frame_tx.send(Arc::new(frame));
        }
        Err(e) => {
            tracing::debug!(error = %e, "malformed subscription frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`, jitter within +-25%.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::Action;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn ws_url_swaps_scheme() {
        let http = Url::parse("http://127.0.0.1:8082").unwrap();
        assert_eq!(
            ws_url(&http, "/api/events").unwrap().as_str(),
            "ws://127.0.0.1:8082/api/events"
        );

        let https = Url::parse("https://bitbox.local/base/").unwrap();
        assert_eq!(
            ws_url(&https, "api/events").unwrap().as_str(),
            "wss://bitbox.local/base/api/events"
        );
    }

    #[test]
    fn parse_and_broadcast_subscription_frame() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "subject": "account/btc/transactions",
            "action": "prepend",
            "object": { "id": "tx9" }
        });
        parse_and_broadcast(&raw.to_string(), &tx);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.subject.as_str(), "account/btc/transactions");
        assert_eq!(frame.action, Action::Prepend);
    }

    #[test]
    fn parse_and_broadcast_skips_notifications() {
        let (tx, mut rx) = broadcast::channel::<Arc<Frame>>(16);

        let raw = serde_json::json!({ "type": "wallet", "code": "btc", "data": "syncdone" });
        parse_and_broadcast(&raw.to_string(), &tx);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn parse_and_broadcast_malformed_json() {
        let (tx, mut rx) = broadcast::channel::<Arc<Frame>>(16);

        parse_and_broadcast("not json at all", &tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn detached_hub_delivers_published_frames() {
        let hub = EventHub::detached(CancellationToken::new());
        let mut rx = hub.subscribe_frames();

        hub.publish(Frame::new("devices/registered", Action::Reload, serde_json::Value::Null));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.subject.as_str(), "devices/registered");
    }
}
