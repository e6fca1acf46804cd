//! Event types for the stemsync event system
//!
//! Provides shared event definitions and the EventBus used by the studio
//! engine to publish transport, synchronization and cache activity.

mod types;

pub use types::{DriftSeverity, TransportState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Studio event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI or written to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StudioEvent {
    /// Transport state changed (Stopped ↔ Playing)
    TransportStateChanged {
        /// Studio session that owns the transport
        session_id: Uuid,
        old_state: TransportState,
        new_state: TransportState,
        /// Derived position at the moment of the change (seconds)
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Unified playback position, emitted once per correction cycle
    ///
    /// High frequency; emitted lossy.
    PositionUpdate {
        session_id: Uuid,
        /// Master time in seconds
        position: f64,
    },

    /// A stem was snapped back to master time
    DriftCorrected {
        session_id: Uuid,
        stem_id: String,
        /// Absolute drift before correction, in milliseconds
        drift_ms: f64,
        severity: DriftSeverity,
    },

    /// Result of the coarse out-of-band sync check
    SyncCheck {
        session_id: Uuid,
        in_sync: bool,
        /// Maximum pairwise drift among ready stems, in milliseconds
        max_drift_ms: f64,
        /// Number of stems realigned to the reference stem
        realigned: usize,
    },

    /// A stem reported metadata after being assigned a source
    StemLoaded {
        stem_id: String,
        /// Whether the source came from the byte cache
        from_cache: bool,
    },

    /// Background population stored a payload in the byte cache
    CacheStored {
        url: String,
        size_bytes: usize,
    },

    /// A prefetch pass was issued
    PrefetchCompleted {
        /// URLs handed to the byte cache for prefetch, in priority order
        requested: usize,
        /// Waveform summaries newly computed
        waveforms: usize,
    },

    /// Playback reached the end of the longest stem
    TrackEnded {
        session_id: Uuid,
        /// Duration in seconds
        duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StudioEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            StudioEvent::TransportStateChanged { .. } => "TransportStateChanged",
            StudioEvent::PositionUpdate { .. } => "PositionUpdate",
            StudioEvent::DriftCorrected { .. } => "DriftCorrected",
            StudioEvent::SyncCheck { .. } => "SyncCheck",
            StudioEvent::StemLoaded { .. } => "StemLoaded",
            StudioEvent::CacheStored { .. } => "CacheStored",
            StudioEvent::PrefetchCompleted { .. } => "PrefetchCompleted",
            StudioEvent::TrackEnded { .. } => "TrackEnded",
        }
    }
}

/// Broadcast bus for studio events
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use stemsync_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity: capacity.max(1) }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StudioEvent,
    ) -> Result<usize, broadcast::error::SendError<StudioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StudioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = StudioEvent::DriftCorrected {
            session_id: Uuid::nil(),
            stem_id: "bass".to_string(),
            drift_ms: 120.0,
            severity: DriftSeverity::Critical,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DriftCorrected");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["stem_id"], "bass");
        assert_eq!(event.event_type(), "DriftCorrected");
    }

    #[test]
    fn test_transport_state_round_trip() {
        let json = serde_json::to_string(&TransportState::Playing).unwrap();
        assert_eq!(json, "\"playing\"");
        assert_eq!(TransportState::default(), TransportState::Stopped);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(DriftSeverity::Critical > DriftSeverity::Gentle);
        assert!(DriftSeverity::Gentle > DriftSeverity::None);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_err_but_lossy_is_fine() {
        let bus = EventBus::new(8);
        let event = StudioEvent::CacheStored { url: "u".to_string(), size_bytes: 1 };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit_lossy(StudioEvent::PrefetchCompleted { requested: 3, waveforms: 1 });

        match rx.recv().await.unwrap() {
            StudioEvent::PrefetchCompleted { requested, waveforms } => {
                assert_eq!(requested, 3);
                assert_eq!(waveforms, 1);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
