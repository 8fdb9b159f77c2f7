//! Per-appliance event streams with shared connections and auto-reconnect.
//!
//! The API pushes appliance events as server-sent events on
//! `GET /api/homeappliances/{haId}/events`. [`EventStreamManager`] keeps at
//! most one such connection per appliance and fans every decoded event out
//! to all [`EventListener`]s registered for that appliance.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use homeconnect_api::stream::{EventListener, EventStreamManager};
//! use homeconnect_api::Event;
//!
//! struct Printer;
//!
//! impl EventListener for Printer {
//!     fn on_event(&self, event: &Event) {
//!         println!("{} = {:?}", event.key, event.value);
//!     }
//! }
//!
//! let id = manager.subscribe("SIEMENS-HCS02DWH1-6BE58C26DCC1", Arc::new(Printer)).await?;
//! // ...
//! manager.unsubscribe(id);
//! manager.dispose_all().await;
//! ```

mod manager;
pub mod sse;

use std::time::Duration;

use tracing::{debug, warn};

pub use manager::{EventStreamManager, ListenerId};

use crate::models::{Event, EventItems};
use sse::SseFrame;

/// Event type the server uses for heartbeats; carries no items.
pub const KEEP_ALIVE: &str = "KEEP-ALIVE";

// ── EventListener ────────────────────────────────────────────────────

/// Receives events for one appliance.
///
/// Callbacks run on the stream's read task. They must not block for long,
/// since the next frame is not processed until every listener returned.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);

    /// The stream is about to reconnect; events may have been missed, so the
    /// listener should resynchronize its full state through the REST API.
    fn on_reconnect(&self) {}
}

// ── StreamState ──────────────────────────────────────────────────────

/// Lifecycle of one appliance's stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Open,
    /// The stream was rejected with 401 and a new token is being acquired.
    Reauthorizing,
    Closed,
}

// ── StreamConfig ─────────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub reconnect: ReconnectConfig,

    /// A connection with no traffic for this long is considered dead.
    /// The server sends a keep-alive roughly every 55 seconds. Default: 120s.
    pub idle_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            idle_timeout: Duration::from_secs(120),
        }
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Decode one frame into its batch of events.
///
/// Keep-alives and frames whose data is not JSON (`CONNECTED` and
/// `DISCONNECTED` carry the bare haId) yield nothing. An item that does not
/// decode is skipped; the rest of the batch is still delivered.
pub fn decode_frame(frame: &SseFrame) -> Vec<Event> {
    if frame.event.as_deref() == Some(KEEP_ALIVE) || frame.data.trim().is_empty() {
        return Vec::new();
    }
    let event_type = frame.event.as_deref().unwrap_or("");

    let Ok(payload) = serde_json::from_str::<serde_json::Value>(&frame.data) else {
        debug!(event = event_type, "event frame without JSON payload");
        return Vec::new();
    };

    let items = match serde_json::from_value::<EventItems>(payload) {
        Ok(payload) => payload.items,
        Err(e) => {
            warn!(error = %e, event = event_type, "dropping event frame with unexpected payload");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Event>(item) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, event = event_type, "skipping undecodable event item");
                None
            }
        })
        .collect()
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many appliances.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }

    #[test]
    fn default_stream_config() {
        let config = StreamConfig::default();
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(60));
        assert!(config.reconnect.max_retries.is_none());
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
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
            d10 <= Duration::from_millis(12_500),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
        assert!(calculate_backoff(u32::MAX, &config) <= Duration::from_millis(12_500));
    }

    #[test]
    fn decode_status_frame_in_order() {
        let events = decode_frame(&frame(
            "STATUS",
            r#"{"items":[
                {"key":"BSH.Common.Status.DoorState","value":"BSH.Common.EnumType.DoorState.Open"},
                {"key":"BSH.Common.Status.OperationState","value":"BSH.Common.EnumType.OperationState.Ready"}
            ],"haId":"SIEMENS-1"}"#,
        ));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, "BSH.Common.Status.DoorState");
        assert_eq!(events[1].key, "BSH.Common.Status.OperationState");
    }

    #[test]
    fn keep_alive_yields_nothing() {
        assert!(decode_frame(&frame(KEEP_ALIVE, "")).is_empty());
        assert!(decode_frame(&frame(KEEP_ALIVE, r#"{"items":[{"key":"x"}]}"#)).is_empty());
    }

    #[test]
    fn bad_item_does_not_drop_its_batch() {
        let events = decode_frame(&frame(
            "NOTIFY",
            r#"{"items":[
                {"key":"BSH.Common.Option.RemainingProgramTime","value":600,"unit":"seconds"},
                {"value":"no key"},
                {"key":["not","a","string"]},
                {"key":"BSH.Common.Option.ProgramProgress","value":40,"unit":"%"}
            ]}"#,
        ));

        let keys: Vec<&str> = events.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "BSH.Common.Option.RemainingProgramTime",
                "",
                "BSH.Common.Option.ProgramProgress"
            ]
        );
        assert_eq!(events[1].value.as_deref(), Some("no key"));
    }

    #[test]
    fn malformed_payload_yields_nothing() {
        assert!(decode_frame(&frame("NOTIFY", "not json")).is_empty());
        assert!(decode_frame(&frame("DISCONNECTED", "SIEMENS-1")).is_empty());
    }
}
