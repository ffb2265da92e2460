#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Weather Telemetry Client - Live Weather-Station Stream
//!
//! Streams the latest telemetry of one weather station from the telemetry
//! platform over WebSocket and keeps the derived display state in memory.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `telemetry`: metrics, samples, bounded history, the store
//!   - `compass`: wind degree to compass octant
//!   - `timestamp`: epoch millis to a pinned display string
//!   - `connection`: socket states and status events
//!   - `session`: credential and subscription target
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: session provider contract
//!   - `services`: widget mount lifecycle, connection health
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `thingsboard`: REST session lookup, frame codec, socket client
//!   - `config`: environment configuration
//!   - `health`: health, telemetry and metrics HTTP endpoint
//!   - `metrics`, `telemetry`: Prometheus and tracing setup
//!
//! # Data Flow
//!
//! ```text
//! login ─► settings ─► SocketClient ─► TelemetryCodec ─► TelemetryStore
//!                          │                                   │
//!                          └── StreamEvent ─► ConnectionHealth  └─► /telemetry
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core telemetry types with no external I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::compass::{CompassDirection, resolve as resolve_direction};
pub use domain::connection::{ConnectionState, StreamEvent};
pub use domain::session::{Credential, SubscriptionTarget};
pub use domain::telemetry::{
    HISTORY_CAPACITY, Metric, MetricReading, MetricSample, MetricSeries, MetricValue,
    SharedTelemetryStore, TelemetrySnapshot, TelemetryStore, TelemetryUpdate,
};
pub use domain::timestamp::TimestampFormatter;

// Application
pub use application::ports::{SessionError, SessionProvider};
pub use application::services::{ConnectionHealth, MountContext, MountError, WidgetMount};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, ErrorPolicy};

// Platform adapters
pub use infrastructure::thingsboard::{
    ClientError, CodecError, HttpSessionProvider, SessionReport, SocketClient, SocketClientConfig,
    StaticSessionProvider, TelemetryCodec,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
