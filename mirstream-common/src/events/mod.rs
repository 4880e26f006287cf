//! Event types for the mirstream event system
//!
//! Provides the shared event definitions and the EventBus used to fan events out
//! to SSE clients.

mod session_types;

pub use session_types::SessionState;

use crate::api::types::FeatureRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// mirstream event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MirEvent {
    /// Session lifecycle state changed
    SessionStateChanged {
        /// State before change
        old_state: SessionState,
        /// State after change
        new_state: SessionState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Features computed for one block and appended to the result store
    FeatureComputed {
        /// The stored record
        record: FeatureRecord,
        /// When the record was stored
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback reached the end of the buffer or was stopped
    PlaybackCompleted {
        /// Blocks handed to the analysis queue
        blocks_enqueued: u64,
        /// Blocks lost because the queue was full
        blocks_dropped: u64,
        /// True when the whole buffer was played
        exhausted: bool,
        /// When playback finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MirEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            MirEvent::SessionStateChanged { .. } => "SessionStateChanged",
            MirEvent::FeatureComputed { .. } => "FeatureComputed",
            MirEvent::PlaybackCompleted { .. } => "PlaybackCompleted",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a `tokio::sync::broadcast` channel:
/// - `emit` never blocks and is callable from plain threads
/// - slow subscribers lag instead of blocking producers
/// - no subscribers is not an error for the producer
///
/// # Examples
///
/// ```
/// use mirstream_common::events::{EventBus, MirEvent, SessionState};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit(MirEvent::SessionStateChanged {
///     old_state: SessionState::Idle,
///     new_state: SessionState::Streaming,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MirEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MirEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    ///
    /// Returns the number of subscribers that received it (0 when nobody listens).
    pub fn emit(&self, event: MirEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured per-subscriber capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
