//! Stream Lifecycle Integration Tests
//!
//! Runs a mounted widget against a local WebSocket server standing in for the
//! telemetry platform.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use weather_telemetry_client::{
    ClientConfig, ClientError, CodecError, CompassDirection, ConnectionState, Credential, Metric,
    MetricValue, MountContext, MountError, SessionError, SharedTelemetryStore,
    StaticSessionProvider, StreamEvent, SubscriptionTarget, WidgetMount,
};

const WAIT: Duration = Duration::from_secs(5);

enum ServerAction {
    Send(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Close,
}

/// Local stand-in for the platform's telemetry socket.
struct FakePlatform {
    url: String,
    received: mpsc::UnboundedReceiver<Message>,
    actions: mpsc::UnboundedSender<ServerAction>,
    connections: Arc<AtomicUsize>,
}

impl FakePlatform {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (actions, mut actions_rx) = mpsc::unbounded_channel::<ServerAction>();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let (mut write, mut read) = ws.split();

                loop {
                    tokio::select! {
                        msg = read.next() => match msg {
                            Some(Ok(msg)) => {
                                let _ = received_tx.send(msg);
                            }
                            _ => break,
                        },
                        action = actions_rx.recv() => match action {
                            Some(ServerAction::Send(text)) => {
                                let _ = write.send(Message::Text(text.into())).await;
                            }
                            Some(ServerAction::Binary(data)) => {
                                let _ = write.send(Message::Binary(data.into())).await;
                            }
                            Some(ServerAction::Ping(data)) => {
                                let _ = write.send(Message::Ping(data.into())).await;
                            }
                            Some(ServerAction::Close) => {
                                let _ = write.send(Message::Close(None)).await;
                            }
                            None => break,
                        },
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}/api/ws/plugins/telemetry"),
            received,
            actions,
            connections,
        }
    }

    fn send(&self, frame: &str) {
        self.actions
            .send(ServerAction::Send(frame.to_string()))
            .unwrap();
    }

    fn send_binary(&self, data: &[u8]) {
        self.actions
            .send(ServerAction::Binary(data.to_vec()))
            .unwrap();
    }

    fn ping(&self, data: &[u8]) {
        self.actions.send(ServerAction::Ping(data.to_vec())).unwrap();
    }

    fn close(&self) {
        self.actions.send(ServerAction::Close).unwrap();
    }

    async fn next_received(&mut self) -> Message {
        timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("platform stopped")
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn config(url: &str, policy: Option<&str>) -> ClientConfig {
    let url = url.to_string();
    let policy = policy.map(str::to_string);
    ClientConfig::from_lookup(move |key| match key {
        "TB_WS_URL" => Some(url.clone()),
        "TB_API_URL" => Some("http://127.0.0.1:1".to_string()),
        "TB_USERNAME" | "TB_PASSWORD" => Some("station".to_string()),
        "WEATHER_ERROR_POLICY" => policy.clone(),
        _ => None,
    })
    .unwrap()
}

fn provider(targets: Vec<SubscriptionTarget>) -> StaticSessionProvider {
    StaticSessionProvider::new(Credential::new("jwt-token"), targets)
}

fn station() -> Vec<SubscriptionTarget> {
    vec![SubscriptionTarget::new("DEVICE", "station-1")]
}

fn context() -> (MountContext, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let ctx = MountContext {
        events: Some(tx),
        ..MountContext::default()
    };
    (ctx, rx)
}

async fn wait_for<F>(rx: &mut mpsc::Receiver<StreamEvent>, mut pred: F) -> StreamEvent
where
    F: FnMut(&StreamEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

async fn wait_subscribed(rx: &mut mpsc::Receiver<StreamEvent>) {
    wait_for(rx, |e| {
        matches!(e, StreamEvent::StateChanged(ConnectionState::Subscribed))
    })
    .await;
}

async fn wait_update(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<Metric> {
    match wait_for(rx, |e| matches!(e, StreamEvent::TelemetryUpdated { .. })).await {
        StreamEvent::TelemetryUpdated { metrics } => metrics,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn subscribes_once_applies_frames_and_closes_once_on_unmount() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();
    let store: SharedTelemetryStore = ctx.store.clone();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    wait_subscribed(&mut events).await;

    let Message::Text(subscribe) = platform.next_received().await else {
        panic!("expected subscribe command");
    };
    let subscribe: serde_json::Value = serde_json::from_str(subscribe.as_str()).unwrap();
    assert_eq!(subscribe["authCmd"]["token"], "jwt-token");
    assert_eq!(subscribe["authCmd"]["cmdId"], 0);
    assert_eq!(subscribe["cmds"][0]["entityType"], "DEVICE");
    assert_eq!(subscribe["cmds"][0]["entityId"], "station-1");
    assert_eq!(subscribe["cmds"][0]["scope"], "LATEST_TELEMETRY");
    assert_eq!(subscribe["cmds"][0]["cmdId"], 10);
    assert_eq!(subscribe["cmds"][0]["type"], "TIMESERIES");

    platform.send(r#"{"subscriptionId":10,"data":{"humidity":[[1700000000000,"55"]]}}"#);
    assert_eq!(wait_update(&mut events).await, vec![Metric::Humidity]);

    let humidity = store.latest(Metric::Humidity).unwrap();
    assert_eq!(humidity.value, MetricValue::Number(55.0));
    assert_eq!(humidity.timestamp, "November 14, 2023 at 10:13:20 PM");
    assert!(store.latest(Metric::Temperature).is_none());

    platform.send(r#"{"subscriptionId":10,"errorCode":0}"#);
    let dropped = wait_for(&mut events, |e| matches!(e, StreamEvent::FrameDropped { .. })).await;
    assert!(matches!(
        dropped,
        StreamEvent::FrameDropped {
            reason: "no_data",
            ..
        }
    ));
    assert_eq!(mount.health().state(), ConnectionState::Subscribed);

    let report = mount.unmount().await.unwrap();

    assert_eq!(report.final_state, ConnectionState::Closed);
    assert_eq!(report.close_frames_sent, 1);
    assert_eq!(report.frames_applied, 1);
    assert_eq!(report.frames_dropped, 1);
    assert_eq!(
        report.transitions,
        vec![
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Subscribed,
            ConnectionState::Closed,
        ]
    );

    assert!(matches!(platform.next_received().await, Message::Close(_)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(platform.received.try_recv().is_err());
    assert_eq!(platform.connections(), 1);
}

#[tokio::test]
async fn wind_direction_and_temperature_history() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();
    let store = ctx.store.clone();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    wait_subscribed(&mut events).await;
    platform.next_received().await;

    for i in 0..11 {
        platform.send(&format!(
            r#"{{"data":{{"temperature":[[{},"{}.5"]],"windDirection":[[1700000000000,"202.5"]]}}}}"#,
            1_700_000_000_000_i64 + i * 1000,
            20 + i
        ));
        wait_update(&mut events).await;
    }

    let history = store.history(Metric::Temperature);
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].value, MetricValue::Number(21.5));
    assert_eq!(history[9].value, MetricValue::Number(30.5));
    assert_eq!(
        store.latest(Metric::WindDirection).map(|s| s.value),
        Some(MetricValue::Direction(CompassDirection::S))
    );
    assert!(store.history(Metric::WindDirection).is_empty());

    mount.unmount().await.unwrap();
}

#[tokio::test]
async fn peer_close_ends_session_without_reconnect() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    wait_subscribed(&mut events).await;
    platform.next_received().await;

    platform.close();
    let report = timeout(WAIT, mount.join()).await.unwrap().unwrap();

    assert_eq!(report.final_state, ConnectionState::Closed);
    assert_eq!(report.close_frames_sent, 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(platform.connections(), 1);
}

#[tokio::test]
async fn missing_target_opens_no_connection() {
    let platform = FakePlatform::start().await;
    let (ctx, _events) = context();
    let health = Arc::clone(&ctx.health);

    let err = WidgetMount::mount(&config(&platform.url, None), &provider(Vec::new()), ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, MountError::Session(SessionError::ConfigMissing)));
    assert_eq!(health.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(platform.connections(), 0);
}

#[tokio::test]
async fn fail_fast_policy_closes_on_bad_frame() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();

    let mount = WidgetMount::mount(
        &config(&platform.url, Some("fail-fast")),
        &provider(station()),
        ctx,
    )
    .await
    .unwrap();
    wait_subscribed(&mut events).await;
    platform.next_received().await;

    platform.send("not json");
    let err = timeout(WAIT, mount.join()).await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        MountError::Client(ClientError::Frame(CodecError::Json(_)))
    ));
    assert!(matches!(platform.next_received().await, Message::Close(_)));
}

#[tokio::test]
async fn silent_degrade_keeps_connection_after_bad_frames() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();
    let store = ctx.store.clone();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    wait_subscribed(&mut events).await;
    platform.next_received().await;

    platform.send("not json");
    platform.send(r#"{"errorCode":2,"errorMsg":"Unauthorized"}"#);
    platform.send(r#"{"data":{"pressure":[[1700000000000,1013.2]]}}"#);
    wait_update(&mut events).await;

    assert_eq!(
        store.latest(Metric::Pressure).map(|s| s.value),
        Some(MetricValue::Number(1013.2))
    );
    assert_eq!(mount.health().frames_dropped(), 2);
    assert_eq!(mount.health().state(), ConnectionState::Subscribed);

    let report = mount.unmount().await.unwrap();
    assert_eq!(report.close_frames_sent, 1);
}

#[tokio::test]
async fn stalled_observer_does_not_block_frames_or_unmount() {
    let mut platform = FakePlatform::start().await;
    let (tx, _idle_rx) = mpsc::channel(4);
    let ctx = MountContext {
        events: Some(tx),
        ..MountContext::default()
    };
    let store = ctx.store.clone();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    platform.next_received().await;

    for i in 0..20 {
        platform.send(&format!(
            r#"{{"data":{{"humidity":[[1700000000000,"{i}"]]}}}}"#
        ));
    }

    let health = Arc::clone(mount.health());
    wait_until(|| health.frames_applied() == 20).await;
    assert_eq!(
        store.latest(Metric::Humidity).map(|s| s.value),
        Some(MetricValue::Number(19.0))
    );
    assert_eq!(mount.health().state(), ConnectionState::Subscribed);

    let report = timeout(WAIT, mount.unmount())
        .await
        .expect("unmount must not wait on the observer")
        .unwrap();
    assert_eq!(report.final_state, ConnectionState::Closed);
    assert_eq!(report.frames_applied, 20);
    assert_eq!(report.close_frames_sent, 1);
}

#[tokio::test]
async fn binary_frames_and_ping_keep_session_alive() {
    let mut platform = FakePlatform::start().await;
    let (ctx, mut events) = context();
    let store = ctx.store.clone();

    let mount = WidgetMount::mount(&config(&platform.url, None), &provider(station()), ctx)
        .await
        .unwrap();
    wait_subscribed(&mut events).await;
    platform.next_received().await;

    platform.send_binary(br#"{"data":{"pressure":[[1700000000000,"1009.5"]]}}"#);
    assert_eq!(wait_update(&mut events).await, vec![Metric::Pressure]);
    assert_eq!(
        store.latest(Metric::Pressure).map(|s| s.value),
        Some(MetricValue::Number(1009.5))
    );

    platform.send_binary(&[0xff, 0xfe, 0xfd]);
    platform.ping(b"keepalive");

    timeout(WAIT, async {
        loop {
            if let Message::Pong(data) = platform.next_received().await
                && data.as_ref() == b"keepalive"
            {
                break;
            }
        }
    })
    .await
    .expect("no pong for ping");

    assert_eq!(
        store.latest(Metric::Pressure).map(|s| s.value),
        Some(MetricValue::Number(1009.5))
    );
    assert!(store.latest(Metric::Humidity).is_none());
    assert_eq!(mount.health().state(), ConnectionState::Subscribed);
    assert_eq!(mount.health().frames_applied(), 1);
    assert_eq!(mount.health().frames_dropped(), 0);

    let report = mount.unmount().await.unwrap();
    assert_eq!(report.final_state, ConnectionState::Closed);
    assert_eq!(report.close_frames_sent, 1);
}
