//! Telemetry WebSocket Client
//!
//! Drives a [`SessionMachine`] over a real `tokio-tungstenite` connection.
//!
//! # Lifecycle
//!
//! 1. Connect to the configured endpoint (`Connecting`).
//! 2. On handshake, send the subscribe command once (`Open` → `Subscribed`).
//! 3. Apply every text frame to the store in delivery order.
//! 4. Stop on cancellation (close frame sent once), peer close, or transport
//!    error. There is no reconnection and no timeout.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, TelemetryCodec};
use super::session_machine::{SessionMachine, SocketCommand, SocketEvent, Step};
use crate::application::services::ConnectionHealth;
use crate::domain::connection::{ConnectionState, StreamEvent};
use crate::domain::session::{Credential, SubscriptionTarget};
use crate::domain::telemetry::SharedTelemetryStore;
use crate::infrastructure::config::{ClientConfig, ErrorPolicy};
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a telemetry session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Frame rejected under the fail-fast policy.
    #[error("frame error: {0}")]
    Frame(#[from] CodecError),
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the telemetry client.
#[derive(Debug, Clone)]
pub struct SocketClientConfig {
    /// WebSocket URL, used verbatim.
    pub endpoint_url: String,
    /// Frame error policy.
    pub error_policy: ErrorPolicy,
}

impl SocketClientConfig {
    /// Create a configuration with the default error policy.
    #[must_use]
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl From<&ClientConfig> for SocketClientConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            endpoint_url: config.endpoints.endpoint_url.clone(),
            error_policy: config.error_policy,
        }
    }
}

// =============================================================================
// Session Report
// =============================================================================

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Final socket state.
    pub final_state: ConnectionState,
    /// Every state entered, starting with `Idle`.
    pub transitions: Vec<ConnectionState>,
    /// Frames applied to the store.
    pub frames_applied: u64,
    /// Frames dropped.
    pub frames_dropped: u64,
    /// Close frames sent by this client.
    pub close_frames_sent: u32,
}

// =============================================================================
// Socket Client
// =============================================================================

/// Telemetry WebSocket client owning one connection.
pub struct SocketClient {
    config: SocketClientConfig,
    machine: SessionMachine,
    health: Arc<ConnectionHealth>,
    event_tx: Option<mpsc::Sender<StreamEvent>>,
    cancel: CancellationToken,
    close_frames_sent: u32,
}

impl SocketClient {
    /// Create a new client in the `Idle` state.
    #[must_use]
    pub fn new(
        config: SocketClientConfig,
        codec: TelemetryCodec,
        credential: Credential,
        target: SubscriptionTarget,
        store: SharedTelemetryStore,
        health: Arc<ConnectionHealth>,
        cancel: CancellationToken,
    ) -> Self {
        let machine = SessionMachine::new(codec, credential, target, store, config.error_policy);
        Self {
            config,
            machine,
            health,
            event_tx: None,
            cancel,
            close_frames_sent: 0,
        }
    }

    /// Forward status events to `tx` as well as the health tracker.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<StreamEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run the session until cancelled, closed by the peer, or failed.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the connection cannot be established, the
    /// transport fails, or a frame is rejected under the fail-fast policy.
    pub async fn run(mut self) -> Result<SessionReport, ClientError> {
        let step = self.machine.handle(SocketEvent::Connect);
        self.publish(step.events);

        tracing::info!(url = %self.config.endpoint_url, "Connecting to telemetry stream");

        let connected = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::info!("Unmounted before connection was established");
                let step = self.machine.handle(SocketEvent::Unmount);
                self.publish(step.events);
                return Ok(self.report());
            }
            result = tokio_tungstenite::connect_async(self.config.endpoint_url.as_str()) => result,
        };

        let ws_stream = match connected {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                let step = self.machine.handle(SocketEvent::TransportError(e.to_string()));
                self.publish(step.events);
                return Err(e.into());
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let step = self.machine.handle(SocketEvent::Opened);
        self.execute(step, &mut write).await?;

        while !self.machine.state().is_terminal() {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::info!("Unmounting telemetry stream");
                    let step = self.machine.handle(SocketEvent::Unmount);
                    self.execute(step, &mut write).await?;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let step = self.machine.handle(SocketEvent::Message(text.as_str().to_owned()));
                            self.execute(step, &mut write).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Ok(text) = String::from_utf8(data.to_vec()) {
                                let step = self.machine.handle(SocketEvent::Message(text));
                                self.execute(step, &mut write).await?;
                            } else {
                                tracing::warn!(len = data.len(), "Received non-UTF8 binary message");
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return Err(self.fail(e));
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Server sent close frame");
                            let step = self.machine.handle(SocketEvent::PeerClosed);
                            self.publish(step.events);
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames carry no telemetry.
                        }
                        Some(Err(e)) => {
                            return Err(self.fail(e));
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            let step = self.machine.handle(SocketEvent::PeerClosed);
                            self.publish(step.events);
                        }
                    }
                }
            }
        }

        Ok(self.report())
    }

    /// Execute the commands of a step, then publish its events.
    async fn execute<W>(&mut self, step: Step, write: &mut W) -> Result<(), ClientError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let Step {
            commands,
            events,
            fatal,
        } = step;

        for command in commands {
            let sent = match command {
                SocketCommand::SendText(json) => write.send(Message::Text(json.into())).await,
                SocketCommand::Close => {
                    self.close_frames_sent += 1;
                    write.send(Message::Close(None)).await
                }
            };

            if let Err(e) = sent {
                self.publish(events);
                return Err(self.fail(e));
            }
        }

        self.publish(events);

        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Feed a transport error into the machine and convert it.
    fn fail(&mut self, error: tungstenite::Error) -> ClientError {
        let step = self.machine.handle(SocketEvent::TransportError(error.to_string()));
        self.publish(step.events);
        error.into()
    }

    /// Record events on the health tracker and offer them to the observer.
    ///
    /// Never waits on the observer: a full channel drops the event.
    fn publish(&self, events: Vec<StreamEvent>) {
        for event in events {
            self.health.record(&event);
            let Some(tx) = &self.event_tx else {
                continue;
            };
            match tx.try_send(event) {
                Ok(()) | Err(TrySendError::Closed(_)) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::debug!(?event, "Status observer lagging, event dropped");
                    metrics::record_status_event_dropped();
                }
            }
        }
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            final_state: self.machine.state(),
            transitions: self.machine.transitions().to_vec(),
            frames_applied: self.machine.frames_applied(),
            frames_dropped: self.machine.frames_dropped(),
            close_frames_sent: self.close_frames_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp::TimestampFormatter;

    fn client(url: &str, cancel: CancellationToken) -> (SocketClient, Arc<ConnectionHealth>) {
        let health = Arc::new(ConnectionHealth::new());
        let client = SocketClient::new(
            SocketClientConfig::new(url),
            TelemetryCodec::new(TimestampFormatter::utc()),
            Credential::new("t"),
            SubscriptionTarget::new("DEVICE", "d"),
            SharedTelemetryStore::new(),
            Arc::clone(&health),
            cancel,
        );
        (client, health)
    }

    #[tokio::test]
    async fn connection_refused_is_terminal_error() {
        // Port 1 is never listening in the test environment.
        let (client, health) = client("ws://127.0.0.1:1/ws", CancellationToken::new());

        let err = client.run().await.unwrap_err();

        assert!(matches!(err, ClientError::WebSocket(_)));
        assert_eq!(health.state(), ConnectionState::Error);
        assert!(health.last_error().is_some());
    }

    #[tokio::test]
    async fn cancelled_before_connect_sends_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (client, health) = client("ws://127.0.0.1:1/ws", cancel);

        let report = client.run().await.unwrap();

        assert_eq!(report.final_state, ConnectionState::Closed);
        assert_eq!(report.close_frames_sent, 0);
        assert_eq!(health.state(), ConnectionState::Closed);
    }

    #[test]
    fn config_from_client_config() {
        let config = ClientConfig::from_lookup(|key| match key {
            "TB_WS_URL" => Some("wss://tb.example.com/ws".to_string()),
            "TB_API_URL" => Some("https://tb.example.com".to_string()),
            "TB_USERNAME" | "TB_PASSWORD" => Some("x".to_string()),
            "WEATHER_ERROR_POLICY" => Some("fail-fast".to_string()),
            _ => None,
        })
        .unwrap();

        let socket = SocketClientConfig::from(&config);
        assert_eq!(socket.endpoint_url, "wss://tb.example.com/ws");
        assert_eq!(socket.error_policy, ErrorPolicy::FailFast);
    }
}
