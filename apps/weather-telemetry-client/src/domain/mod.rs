//! Domain Layer - Core telemetry types and state.
//!
//! This layer contains the weather-station data model and the pure
//! derivations on it (compass labels, timestamp strings). Nothing here
//! performs I/O.

/// Compass octant resolution for wind direction.
pub mod compass;

/// Socket lifecycle states and status events.
pub mod connection;

/// Credential and subscription target types.
pub mod session;

/// Metrics, samples, history series and the telemetry store.
pub mod telemetry;

/// Epoch timestamp formatting.
pub mod timestamp;
