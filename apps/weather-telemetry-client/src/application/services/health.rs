//! Connection health tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::connection::{ConnectionState, StreamEvent};

/// Shared view of one stream session, fed from its status events.
#[derive(Debug)]
pub struct ConnectionHealth {
    state: parking_lot::RwLock<ConnectionState>,
    subscribed_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    last_frame_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    last_error: parking_lot::RwLock<Option<String>>,
    frames_applied: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHealth {
    /// Create a tracker in the `Idle` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(ConnectionState::Idle),
            subscribed_at: parking_lot::RwLock::new(None),
            last_frame_at: parking_lot::RwLock::new(None),
            last_error: parking_lot::RwLock::new(None),
            frames_applied: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Fold one status event into the tracker.
    pub fn record(&self, event: &StreamEvent) {
        match event {
            StreamEvent::StateChanged(state) => {
                *self.state.write() = *state;
                if *state == ConnectionState::Subscribed {
                    *self.subscribed_at.write() = Some(Utc::now());
                }
            }
            StreamEvent::TelemetryUpdated { .. } => {
                self.frames_applied.fetch_add(1, Ordering::Relaxed);
                *self.last_frame_at.write() = Some(Utc::now());
            }
            StreamEvent::FrameDropped { detail, .. } => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write() = Some(detail.clone());
            }
            StreamEvent::Error(message) => {
                *self.last_error.write() = Some(message.clone());
            }
        }
    }

    /// Current socket state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the session is subscribed and receiving.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Subscribed
    }

    /// When the subscription was acknowledged locally.
    #[must_use]
    pub fn subscribed_at(&self) -> Option<DateTime<Utc>> {
        *self.subscribed_at.read()
    }

    /// When the last frame was applied.
    #[must_use]
    pub fn last_frame_at(&self) -> Option<DateTime<Utc>> {
        *self.last_frame_at.read()
    }

    /// Most recent transport or frame error.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Frames applied so far.
    #[must_use]
    pub fn frames_applied(&self) -> u64 {
        self.frames_applied.load(Ordering::Relaxed)
    }

    /// Frames dropped so far.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}
