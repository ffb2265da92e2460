//! Weather Telemetry State
//!
//! Holds the latest sample of every weather-station metric and a bounded
//! history series for the temperature metric.
//!
//! # Design
//!
//! - Metrics are a closed set of seven keys known to the station firmware.
//! - Entries are created lazily on the first sample and overwritten on every
//!   later one; nothing is removed mid-session.
//! - A [`TelemetryUpdate`] carries every sample decoded from one inbound frame
//!   and is applied under a single write lock, so readers never observe half
//!   of a frame.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use crate::domain::compass::CompassDirection;

/// Number of samples retained in a history series.
pub const HISTORY_CAPACITY: usize = 10;

// =============================================================================
// Metric
// =============================================================================

/// A weather-station metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Outdoor temperature.
    Temperature,
    /// Outdoor relative humidity.
    Humidity,
    /// Absolute pressure.
    Pressure,
    /// Rainfall total.
    RainRate,
    /// Wind direction, stored as a compass label.
    WindDirection,
    /// Wind speed.
    WindSpeed,
    /// Dust density.
    DustDensity,
}

impl Metric {
    /// Every known metric, in dashboard order.
    pub const ALL: [Self; 7] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::RainRate,
        Self::WindDirection,
        Self::WindSpeed,
        Self::DustDensity,
    ];

    /// Telemetry key used on the wire.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::RainRate => "rainRate",
            Self::WindDirection => "windDirection",
            Self::WindSpeed => "windSpeed",
            Self::DustDensity => "dustDensity",
        }
    }

    /// Look up a metric by its wire key.
    #[must_use]
    pub fn from_wire_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.wire_key() == key)
    }

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Pressure => "Pressure",
            Self::RainRate => "Rainfall",
            Self::WindDirection => "Wind Direction",
            Self::WindSpeed => "Wind Speed",
            Self::DustDensity => "Dust Index",
        }
    }

    /// Display unit, if the metric has one.
    #[must_use]
    pub const fn unit(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("°C"),
            Self::Humidity => Some("%"),
            Self::Pressure => Some("hPa"),
            Self::RainRate => Some("mm"),
            Self::WindDirection => None,
            Self::WindSpeed => Some("m/s"),
            Self::DustDensity => Some("µg/m³"),
        }
    }

    /// Whether the store keeps a history series for this metric.
    #[must_use]
    pub const fn keeps_history(self) -> bool {
        matches!(self, Self::Temperature)
    }

    /// Placeholder shown before the first sample arrives.
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::WindDirection => "NA",
            _ => "0",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_key())
    }
}

// =============================================================================
// Samples
// =============================================================================

/// Value carried by a sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Numeric reading.
    Number(f64),
    /// Non-numeric reading, kept verbatim.
    Text(String),
    /// Wind direction resolved to its compass octant.
    Direction(CompassDirection),
}

impl MetricValue {
    /// Numeric reading, if this value is numeric.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Direction(d) => f.write_str(d.label()),
        }
    }
}

/// One reading of one metric. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// The reading.
    pub value: MetricValue,
    /// Formatted timestamp.
    pub timestamp: String,
    /// Raw epoch-millisecond timestamp.
    pub recorded_at: i64,
}

impl MetricSample {
    /// Create a new sample.
    #[must_use]
    pub fn new(value: MetricValue, timestamp: impl Into<String>, recorded_at: i64) -> Self {
        Self {
            value,
            timestamp: timestamp.into(),
            recorded_at,
        }
    }
}

// =============================================================================
// History Series
// =============================================================================

/// Fixed-capacity history of one metric in arrival order.
///
/// Pushing into a full series evicts the oldest sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    samples: VecDeque<MetricSample>,
    capacity: usize,
}

impl Default for MetricSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSeries {
    /// Create an empty series with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create an empty series holding at most `capacity` samples.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest if the series is full.
    pub fn push(&mut self, sample: MetricSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample.
    #[must_use]
    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// Copy the samples out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<MetricSample> {
        self.samples.iter().cloned().collect()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Samples decoded from a single inbound frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryUpdate {
    samples: Vec<(Metric, MetricSample)>,
}

impl TelemetryUpdate {
    /// Create an empty update.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Add a sample for a metric.
    pub fn push(&mut self, metric: Metric, sample: MetricSample) {
        self.samples.push((metric, sample));
    }

    /// Whether the frame carried no usable samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Metrics present in this update, in frame order.
    #[must_use]
    pub fn metrics(&self) -> Vec<Metric> {
        self.samples.iter().map(|(m, _)| *m).collect()
    }

    /// Sample for a metric, if present.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<&MetricSample> {
        self.samples
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, s)| s)
    }

    /// Iterate over the samples.
    pub fn iter(&self) -> impl Iterator<Item = &(Metric, MetricSample)> {
        self.samples.iter()
    }
}

impl IntoIterator for TelemetryUpdate {
    type Item = (Metric, MetricSample);
    type IntoIter = std::vec::IntoIter<(Metric, MetricSample)>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

/// Latest sample per metric plus history for metrics that keep it.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    latest: BTreeMap<Metric, MetricSample>,
    history: BTreeMap<Metric, MetricSeries>,
}

impl TelemetryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample as the metric's latest value.
    ///
    /// Metrics that keep history also get the sample appended to their
    /// series.
    pub fn update(&mut self, metric: Metric, sample: MetricSample) {
        if metric.keeps_history() {
            self.history.entry(metric).or_default().push(sample.clone());
        }
        self.latest.insert(metric, sample);
    }

    /// Apply every sample of one frame.
    pub fn apply(&mut self, update: TelemetryUpdate) {
        for (metric, sample) in update {
            self.update(metric, sample);
        }
    }

    /// Latest sample for a metric.
    #[must_use]
    pub fn latest(&self, metric: Metric) -> Option<&MetricSample> {
        self.latest.get(&metric)
    }

    /// History series for a metric, if it keeps one and has received samples.
    #[must_use]
    pub fn series(&self, metric: Metric) -> Option<&MetricSeries> {
        self.history.get(&metric)
    }

    /// Point-in-time copy of the store for rendering.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let readings = Metric::ALL
            .into_iter()
            .map(|metric| MetricReading {
                metric,
                title: metric.title(),
                unit: metric.unit(),
                sample: self.latest.get(&metric).cloned(),
            })
            .collect();

        let temperature_history = self
            .series(Metric::Temperature)
            .map(MetricSeries::to_vec)
            .unwrap_or_default();

        TelemetrySnapshot {
            readings,
            temperature_history,
        }
    }
}

/// Store handle shared between the socket driver and its observers.
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetryStore {
    inner: Arc<RwLock<TelemetryStore>>,
}

impl SharedTelemetryStore {
    /// Create an empty shared store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame's samples under a single write lock.
    pub fn apply(&self, update: TelemetryUpdate) {
        self.inner.write().apply(update);
    }

    /// Latest sample for a metric.
    #[must_use]
    pub fn latest(&self, metric: Metric) -> Option<MetricSample> {
        self.inner.read().latest(metric).cloned()
    }

    /// Copy of a metric's history series.
    #[must_use]
    pub fn history(&self, metric: Metric) -> Vec<MetricSample> {
        self.inner
            .read()
            .series(metric)
            .map(MetricSeries::to_vec)
            .unwrap_or_default()
    }

    /// Point-in-time copy of the store.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.read().snapshot()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Latest reading of one metric with its display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    /// The metric.
    pub metric: Metric,
    /// Human-readable title.
    pub title: &'static str,
    /// Display unit.
    pub unit: Option<&'static str>,
    /// Latest sample, `None` until the first one arrives.
    pub sample: Option<MetricSample>,
}

impl MetricReading {
    /// Value as displayed, falling back to the metric's placeholder.
    #[must_use]
    pub fn display_value(&self) -> String {
        let value = self.sample.as_ref().map_or_else(
            || self.metric.placeholder().to_string(),
            |s| s.value.to_string(),
        );
        match self.unit {
            Some(unit) => format!("{value} {unit}"),
            None => value,
        }
    }

    /// Formatted timestamp, empty until the first sample arrives.
    #[must_use]
    pub fn display_timestamp(&self) -> &str {
        self.sample.as_ref().map_or("", |s| s.timestamp.as_str())
    }
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// One reading per known metric, in dashboard order.
    pub readings: Vec<MetricReading>,
    /// Temperature history, oldest first.
    pub temperature_history: Vec<MetricSample>,
}

impl TelemetrySnapshot {
    /// Reading for a metric.
    #[must_use]
    pub fn reading(&self, metric: Metric) -> Option<&MetricReading> {
        self.readings.iter().find(|r| r.metric == metric)
    }
}
