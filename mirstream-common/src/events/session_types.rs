//! Session lifecycle type definitions

use serde::{Deserialize, Serialize};

/// Streaming session lifecycle state
///
/// Transitions: `Idle -> Streaming -> Stopping -> Stopped` (terminal).
/// `Streaming -> Stopped` is also legal when playback completes on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, nothing running
    Idle,
    /// Output stream and analysis thread running
    Streaming,
    /// Cancellation requested, waiting for threads to observe it
    Stopping,
    /// All threads joined
    Stopped,
}

impl SessionState {
    /// Compact encoding for atomic storage
    pub fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Streaming => 1,
            SessionState::Stopping => 2,
            SessionState::Stopped => 3,
        }
    }

    /// Inverse of [`SessionState::as_u8`]; unknown values map to `Stopped`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Streaming,
            2 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}
