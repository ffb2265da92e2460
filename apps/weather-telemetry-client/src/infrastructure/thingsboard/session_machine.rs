//! Stream Session State Machine
//!
//! Transport-free core of the socket client. The driver feeds it one
//! [`SocketEvent`] at a time, in delivery order, and executes the
//! [`SocketCommand`]s it returns. Store updates happen inside
//! [`SessionMachine::handle`], so everything a single frame changes is applied
//! before the next event is looked at.
//!
//! # Guarantees
//!
//! - The subscribe command is produced exactly once, on the first `Opened`.
//! - A close command is produced only when a socket is actually open, and at
//!   most once.
//! - `Closed` and `Error` are terminal; later events are ignored.

use crate::domain::connection::{ConnectionState, StreamEvent};
use crate::domain::session::{Credential, SubscriptionTarget};
use crate::domain::telemetry::SharedTelemetryStore;
use crate::infrastructure::config::ErrorPolicy;
use crate::infrastructure::metrics;

use super::codec::{CodecError, TelemetryCodec};

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Start connecting.
    Connect,
    /// Handshake completed.
    Opened,
    /// Text frame received.
    Message(String),
    /// Transport failed.
    TransportError(String),
    /// Peer closed the connection or the stream ended.
    PeerClosed,
    /// Widget is being torn down.
    Unmount,
}

/// Transport actions requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    /// Send a text frame.
    SendText(String),
    /// Send a close frame.
    Close,
}

/// Result of handling one event.
#[derive(Debug, Default)]
pub struct Step {
    /// Transport actions, in order.
    pub commands: Vec<SocketCommand>,
    /// Status events, in order.
    pub events: Vec<StreamEvent>,
    /// Frame error that ends the session under [`ErrorPolicy::FailFast`].
    pub fatal: Option<CodecError>,
}

/// State machine for one socket connection.
#[derive(Debug)]
pub struct SessionMachine {
    codec: TelemetryCodec,
    credential: Credential,
    target: SubscriptionTarget,
    store: SharedTelemetryStore,
    policy: ErrorPolicy,
    state: ConnectionState,
    transitions: Vec<ConnectionState>,
    subscribe_sent: bool,
    close_requested: bool,
    frames_applied: u64,
    frames_dropped: u64,
}

impl SessionMachine {
    /// Create a machine in the `Idle` state.
    #[must_use]
    pub fn new(
        codec: TelemetryCodec,
        credential: Credential,
        target: SubscriptionTarget,
        store: SharedTelemetryStore,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            codec,
            credential,
            target,
            store,
            policy,
            state: ConnectionState::Idle,
            transitions: vec![ConnectionState::Idle],
            subscribe_sent: false,
            close_requested: false,
            frames_applied: 0,
            frames_dropped: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    #[must_use]
    pub fn transitions(&self) -> &[ConnectionState] {
        &self.transitions
    }

    /// Frames applied to the store.
    #[must_use]
    pub const fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Frames dropped without touching the store.
    #[must_use]
    pub const fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Handle one event.
    pub fn handle(&mut self, event: SocketEvent) -> Step {
        let mut step = Step::default();

        if self.state.is_terminal() {
            tracing::trace!(state = %self.state, ?event, "Ignoring event after teardown");
            return step;
        }

        match event {
            SocketEvent::Connect => self.on_connect(&mut step),
            SocketEvent::Opened => self.on_opened(&mut step),
            SocketEvent::Message(text) => self.on_message(&text, &mut step),
            SocketEvent::TransportError(message) => self.on_transport_error(message, &mut step),
            SocketEvent::PeerClosed => self.on_peer_closed(&mut step),
            SocketEvent::Unmount => self.on_unmount(&mut step),
        }

        step
    }

    fn on_connect(&mut self, step: &mut Step) {
        if self.state == ConnectionState::Idle {
            self.transition(ConnectionState::Connecting, step);
        }
    }

    fn on_opened(&mut self, step: &mut Step) {
        if self.state != ConnectionState::Connecting || self.subscribe_sent {
            tracing::debug!(state = %self.state, "Ignoring unexpected open event");
            return;
        }

        tracing::info!("Telemetry socket open");
        self.transition(ConnectionState::Open, step);

        match self.codec.encode_subscribe(&self.credential, &self.target) {
            Ok(json) => {
                self.subscribe_sent = true;
                step.commands.push(SocketCommand::SendText(json));
                tracing::info!(
                    entity_type = %self.target.entity_type,
                    entity_id = %self.target.entity_id,
                    "Subscribed to latest telemetry"
                );
                self.transition(ConnectionState::Subscribed, step);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode subscribe command");
                self.request_close(step);
                step.events.push(StreamEvent::Error(e.to_string()));
                self.transition(ConnectionState::Error, step);
            }
        }
    }

    fn on_message(&mut self, text: &str, step: &mut Step) {
        if self.state != ConnectionState::Subscribed {
            tracing::debug!(state = %self.state, "Ignoring frame before subscription");
            return;
        }

        tracing::debug!(len = text.len(), "Telemetry frame received");
        metrics::record_frame_received();

        match self.codec.decode(text) {
            Ok(update) => {
                let applied = update.metrics();
                for metric in &applied {
                    metrics::record_sample_applied(*metric);
                }
                self.store.apply(update);
                self.frames_applied += 1;
                step.events
                    .push(StreamEvent::TelemetryUpdated { metrics: applied });
            }
            Err(e) => {
                self.frames_dropped += 1;
                metrics::record_frame_dropped(e.reason());
                match &e {
                    CodecError::NoData => tracing::error!("No data received from telemetry stream"),
                    _ => tracing::warn!(error = %e, "Dropping telemetry frame"),
                }
                step.events.push(StreamEvent::FrameDropped {
                    reason: e.reason(),
                    detail: e.to_string(),
                });

                if self.policy == ErrorPolicy::FailFast {
                    self.request_close(step);
                    self.transition(ConnectionState::Error, step);
                    step.fatal = Some(e);
                }
            }
        }
    }

    fn on_transport_error(&mut self, message: String, step: &mut Step) {
        tracing::error!(error = %message, "Telemetry socket error");
        metrics::record_websocket_error("transport");
        step.events.push(StreamEvent::Error(message));
        self.transition(ConnectionState::Error, step);
    }

    fn on_peer_closed(&mut self, step: &mut Step) {
        tracing::info!("Telemetry socket closed");
        self.transition(ConnectionState::Closed, step);
    }

    fn on_unmount(&mut self, step: &mut Step) {
        self.request_close(step);
        self.transition(ConnectionState::Closed, step);
    }

    fn request_close(&mut self, step: &mut Step) {
        if self.state.has_open_socket() && !self.close_requested {
            self.close_requested = true;
            step.commands.push(SocketCommand::Close);
        }
    }

    fn transition(&mut self, next: ConnectionState, step: &mut Step) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
        self.transitions.push(next);
        metrics::set_connection_state(next);
        step.events.push(StreamEvent::StateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{Metric, MetricValue};
    use crate::domain::timestamp::TimestampFormatter;

    fn machine(policy: ErrorPolicy) -> (SessionMachine, SharedTelemetryStore) {
        let store = SharedTelemetryStore::new();
        let machine = SessionMachine::new(
            TelemetryCodec::new(TimestampFormatter::utc()),
            Credential::new("token-1"),
            SubscriptionTarget::new("DEVICE", "station-1"),
            store.clone(),
            policy,
        );
        (machine, store)
    }

    fn subscribed() -> (SessionMachine, SharedTelemetryStore) {
        let (mut m, store) = machine(ErrorPolicy::SilentDegrade);
        m.handle(SocketEvent::Connect);
        m.handle(SocketEvent::Opened);
        assert_eq!(m.state(), ConnectionState::Subscribed);
        (m, store)
    }

    fn sends(step: &Step) -> usize {
        step.commands
            .iter()
            .filter(|c| matches!(c, SocketCommand::SendText(_)))
            .count()
    }

    fn closes(step: &Step) -> usize {
        step.commands
            .iter()
            .filter(|c| matches!(c, SocketCommand::Close))
            .count()
    }

    #[test]
    fn open_sends_subscribe_exactly_once() {
        let (mut m, _) = machine(ErrorPolicy::SilentDegrade);
        m.handle(SocketEvent::Connect);

        let first = m.handle(SocketEvent::Opened);
        let second = m.handle(SocketEvent::Opened);

        assert_eq!(sends(&first), 1);
        assert_eq!(sends(&second), 0);
        assert_eq!(
            m.transitions(),
            &[
                ConnectionState::Idle,
                ConnectionState::Connecting,
                ConnectionState::Open,
                ConnectionState::Subscribed,
            ]
        );
    }

    #[test]
    fn subscribe_payload_carries_token_and_target() {
        let (mut m, _) = machine(ErrorPolicy::SilentDegrade);
        m.handle(SocketEvent::Connect);
        let step = m.handle(SocketEvent::Opened);

        let Some(SocketCommand::SendText(json)) = step.commands.first() else {
            panic!("expected subscribe command");
        };
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["authCmd"]["token"], "token-1");
        assert_eq!(value["cmds"][0]["entityId"], "station-1");
    }

    #[test]
    fn open_before_connect_is_ignored() {
        let (mut m, _) = machine(ErrorPolicy::SilentDegrade);
        let step = m.handle(SocketEvent::Opened);
        assert!(step.commands.is_empty());
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn frame_updates_store() {
        let (mut m, store) = subscribed();

        let step = m.handle(SocketEvent::Message(
            r#"{"data":{"humidity":[[1700000000000,55]]}}"#.to_string(),
        ));

        assert_eq!(
            step.events,
            vec![StreamEvent::TelemetryUpdated {
                metrics: vec![Metric::Humidity]
            }]
        );
        assert_eq!(
            store.latest(Metric::Humidity).map(|s| s.value),
            Some(MetricValue::Number(55.0))
        );
        assert!(store.latest(Metric::Temperature).is_none());
        assert_eq!(m.frames_applied(), 1);
    }

    #[test]
    fn frame_without_data_is_dropped_and_connection_stays_up() {
        let (mut m, store) = subscribed();

        let step = m.handle(SocketEvent::Message(r#"{"subscriptionId":10}"#.to_string()));

        assert!(matches!(
            step.events.as_slice(),
            [StreamEvent::FrameDropped { reason: "no_data", .. }]
        ));
        assert!(step.commands.is_empty());
        assert!(step.fatal.is_none());
        assert_eq!(m.state(), ConnectionState::Subscribed);
        assert_eq!(m.frames_dropped(), 1);
        assert_eq!(store.snapshot(), SharedTelemetryStore::new().snapshot());
    }

    #[test]
    fn fail_fast_closes_on_bad_frame() {
        let (mut m, _) = machine(ErrorPolicy::FailFast);
        m.handle(SocketEvent::Connect);
        m.handle(SocketEvent::Opened);

        let step = m.handle(SocketEvent::Message("{}".to_string()));

        assert_eq!(closes(&step), 1);
        assert!(matches!(step.fatal, Some(CodecError::NoData)));
        assert_eq!(m.state(), ConnectionState::Error);
    }

    #[test]
    fn unmount_before_open_sends_no_close() {
        let (mut m, _) = machine(ErrorPolicy::SilentDegrade);
        m.handle(SocketEvent::Connect);

        let step = m.handle(SocketEvent::Unmount);

        assert!(step.commands.is_empty());
        assert_eq!(m.state(), ConnectionState::Closed);
    }

    #[test]
    fn unmount_while_idle_is_noop_teardown() {
        let (mut m, _) = machine(ErrorPolicy::SilentDegrade);

        let step = m.handle(SocketEvent::Unmount);

        assert!(step.commands.is_empty());
        assert!(!m.transitions().contains(&ConnectionState::Connecting));
    }

    #[test]
    fn unmount_after_subscribe_closes_exactly_once() {
        let (mut m, _) = subscribed();

        let first = m.handle(SocketEvent::Unmount);
        let second = m.handle(SocketEvent::Unmount);

        assert_eq!(closes(&first), 1);
        assert_eq!(closes(&second), 0);
        assert_eq!(m.state(), ConnectionState::Closed);
    }

    #[test]
    fn transport_error_is_terminal() {
        let (mut m, store) = subscribed();

        m.handle(SocketEvent::TransportError("reset by peer".to_string()));
        let after = m.handle(SocketEvent::Message(
            r#"{"data":{"humidity":[[1700000000000,55]]}}"#.to_string(),
        ));
        let reconnect = m.handle(SocketEvent::Connect);

        assert_eq!(m.state(), ConnectionState::Error);
        assert!(after.events.is_empty());
        assert!(reconnect.events.is_empty());
        assert!(store.latest(Metric::Humidity).is_none());
    }

    #[test]
    fn peer_close_needs_no_close_frame() {
        let (mut m, _) = subscribed();

        let step = m.handle(SocketEvent::PeerClosed);
        let unmount = m.handle(SocketEvent::Unmount);

        assert!(step.commands.is_empty());
        assert!(unmount.commands.is_empty());
        assert_eq!(m.state(), ConnectionState::Closed);
    }

    #[test]
    fn messages_before_subscription_are_ignored() {
        let (mut m, store) = machine(ErrorPolicy::SilentDegrade);
        m.handle(SocketEvent::Connect);

        let step = m.handle(SocketEvent::Message(
            r#"{"data":{"humidity":[[1700000000000,55]]}}"#.to_string(),
        ));

        assert!(step.events.is_empty());
        assert!(store.latest(Metric::Humidity).is_none());
    }
}
