//! Prometheus Metrics Module
//!
//! Exposes client metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Counts of telemetry frames received and dropped
//! - **Samples**: Samples applied to the store, per metric
//! - **Connection**: Socket state and transport errors
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Without an
//! installed recorder every recording function is a no-op.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::connection::ConnectionState;
use crate::domain::telemetry::Metric;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "weather_client_frames_received_total",
        "Total telemetry frames received while subscribed"
    );
    describe_counter!(
        "weather_client_frames_dropped_total",
        "Total telemetry frames dropped without updating the store"
    );
    describe_counter!(
        "weather_client_samples_applied_total",
        "Total metric samples applied to the telemetry store"
    );
    describe_counter!(
        "weather_client_websocket_errors_total",
        "Total WebSocket transport errors"
    );
    describe_counter!(
        "weather_client_status_events_dropped_total",
        "Status events not delivered because the observer channel was full"
    );
    describe_gauge!(
        "weather_client_connection_state",
        "Socket state (0 idle, 1 connecting, 2 open, 3 subscribed, 4 closed, 5 error)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a telemetry frame received while subscribed.
pub fn record_frame_received() {
    counter!("weather_client_frames_received_total").increment(1);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: &'static str) {
    counter!("weather_client_frames_dropped_total", "reason" => reason).increment(1);
}

/// Record a sample applied to the store.
pub fn record_sample_applied(metric: Metric) {
    counter!(
        "weather_client_samples_applied_total",
        "metric" => metric.wire_key()
    )
    .increment(1);
}

/// Record a WebSocket error.
pub fn record_websocket_error(error_type: &'static str) {
    counter!(
        "weather_client_websocket_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a status event the observer channel had no room for.
pub fn record_status_event_dropped() {
    counter!("weather_client_status_events_dropped_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("weather_client_connection_state").set(f64::from(state.code()));
}

// =============================================================================
// Tests
// =============================================================================
