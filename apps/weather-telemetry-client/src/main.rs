//! Weather Telemetry Client Binary
//!
//! Mounts one weather-station widget and keeps its telemetry current.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin weather-telemetry-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TB_WS_URL`: telemetry WebSocket URL, used verbatim
//! - `TB_API_URL`: platform REST base URL
//! - `TB_USERNAME`, `TB_PASSWORD`: login credentials
//!
//! ## Optional
//! - `WEATHER_SETTINGS_URL`: widget settings lookup (default: `{TB_API_URL}/api/settings`)
//! - `WEATHER_UTC_OFFSET`: offset for displayed timestamps (default: +00:00)
//! - `WEATHER_ERROR_POLICY`: silent-degrade | fail-fast (default: silent-degrade)
//! - `WEATHER_HEALTH_PORT`: health/metrics HTTP port, 0 disables (default: 8083)
//! - `WEATHER_HTTP_TIMEOUT_SECS`: login/settings request timeout (default: 10)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weather_telemetry_client::infrastructure::health::{HealthServer, HealthServerState};
use weather_telemetry_client::infrastructure::telemetry;
use weather_telemetry_client::{
    ClientConfig, ConnectionHealth, HttpSessionProvider, MountContext, MountError, SessionError,
    SharedTelemetryStore, StreamEvent, WidgetMount, init_metrics,
};

/// Status event channel capacity.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting weather telemetry client");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let store = SharedTelemetryStore::new();
    let health = Arc::new(ConnectionHealth::new());

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&health),
            store.clone(),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);
    let event_store = store.clone();
    tokio::spawn(async move {
        handle_stream_events(event_rx, event_store).await;
    });

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        await_shutdown(signal_token).await;
    });

    let provider = HttpSessionProvider::new(&config).context("failed to build HTTP client")?;
    let ctx = MountContext {
        store,
        health,
        events: Some(event_tx),
        shutdown: shutdown_token.clone(),
    };

    let mount = match WidgetMount::mount(&config, &provider, ctx).await {
        Ok(mount) => mount,
        Err(MountError::Session(SessionError::ConfigMissing)) => {
            tracing::warn!("Widget not configured; nothing to stream");
            shutdown_token.cancel();
            return Ok(());
        }
        Err(e) => {
            shutdown_token.cancel();
            return Err(e).context("failed to mount widget");
        }
    };

    tracing::info!("Weather telemetry client ready");

    match mount.join().await {
        Ok(report) => tracing::info!(
            final_state = %report.final_state,
            frames_applied = report.frames_applied,
            frames_dropped = report.frames_dropped,
            "Telemetry session ended"
        ),
        Err(e) => tracing::error!(error = %e, "Telemetry session failed"),
    }

    if !shutdown_token.is_cancelled() {
        tracing::warn!("Telemetry is stale until restart; waiting for shutdown");
        shutdown_token.cancelled().await;
    }

    tracing::info!("Weather telemetry client stopped");
    Ok(())
}

/// Log display values for every update.
async fn handle_stream_events(mut rx: mpsc::Receiver<StreamEvent>, store: SharedTelemetryStore) {
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::StateChanged(state) => {
                tracing::info!(state = %state, "Connection state changed");
            }
            StreamEvent::TelemetryUpdated { metrics } => {
                let snapshot = store.snapshot();
                for metric in metrics {
                    if let Some(reading) = snapshot.reading(metric) {
                        tracing::info!(
                            metric = reading.title,
                            value = %reading.display_value(),
                            at = reading.display_timestamp(),
                            "Telemetry updated"
                        );
                    }
                }
            }
            StreamEvent::FrameDropped { reason, .. } => {
                tracing::debug!(reason, "Frame dropped");
            }
            StreamEvent::Error(error) => {
                tracing::debug!(%error, "Stream error reported");
            }
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        error_policy = config.error_policy.as_str(),
        health_port = config.server.health_port,
        utc_offset = %config.display.utc_offset,
        "Configuration loaded"
    );
    tracing::debug!(
        endpoint_url = %config.endpoints.endpoint_url,
        api_url = %config.endpoints.api_url,
        settings_url = %config.endpoints.settings_url,
        "Platform endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, unmounting");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, unmounting");
        }
        () = shutdown_token.cancelled() => {
            return;
        }
    }

    shutdown_token.cancel();
}
