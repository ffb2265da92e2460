//! Connection Lifecycle Types
//!
//! States of the single telemetry socket owned by a mounted widget, and the
//! status events emitted as it moves through them.
//!
//! ```text
//! Idle ──► Connecting ──► Open ──► Subscribed ──► Closed
//!              │            │          │
//!              └────────────┴──────────┴────────► Error
//! ```
//!
//! `Closed` and `Error` are terminal. There is no reconnection: a dropped
//! connection stays down until the widget is mounted again.

use std::fmt;

use serde::Serialize;

use crate::domain::telemetry::Metric;

/// State of the telemetry socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Open,
    /// Subscribe command sent; telemetry frames are applied.
    Subscribed,
    /// Closed by either side.
    Closed,
    /// Transport failure.
    Error,
}

impl ConnectionState {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }

    /// Whether a socket exists that must be closed on teardown.
    #[must_use]
    pub const fn has_open_socket(self) -> bool {
        matches!(self, Self::Open | Self::Subscribed)
    }

    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Subscribed => "subscribed",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }

    /// Numeric code for gauges.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Subscribed => 3,
            Self::Closed => 4,
            Self::Error => 5,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status events emitted by a stream session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The socket moved to a new state.
    StateChanged(ConnectionState),
    /// A frame was applied to the store.
    TelemetryUpdated {
        /// Metrics present in the frame.
        metrics: Vec<Metric>,
    },
    /// A frame was dropped without touching the store.
    FrameDropped {
        /// Short reason label.
        reason: &'static str,
        /// Error detail.
        detail: String,
    },
    /// Transport failure.
    Error(String),
}
