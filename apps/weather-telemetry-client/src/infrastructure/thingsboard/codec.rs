//! Telemetry Frame Codec
//!
//! Encodes the subscribe command and decodes inbound telemetry frames into
//! typed samples.
//!
//! # Decoding Rules
//!
//! - A frame with a non-zero `errorCode` is a rejected subscription.
//! - A frame without a `data` object carries nothing to apply.
//! - For each known metric present in `data`, only the first (newest)
//!   `[epochMillis, value]` pair is used. Unknown keys are ignored.
//! - Numeric strings are read as numbers; other strings are kept verbatim.
//! - Wind direction is resolved to a compass label before it is stored.
//! - A malformed entry is skipped without affecting the other metrics.

use serde_json::Value;

use super::messages::{SubscribeCommand, TelemetryFrame};
use crate::domain::compass::CompassDirection;
use crate::domain::session::{Credential, SubscriptionTarget};
use crate::domain::telemetry::{Metric, MetricSample, MetricValue, TelemetryUpdate};
use crate::domain::timestamp::TimestampFormatter;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame carried no `data` field.
    #[error("frame has no data")]
    NoData,

    /// Server rejected the subscription.
    #[error("subscription rejected ({code}): {message}")]
    Rejected {
        /// Error code from server.
        code: i32,
        /// Error message from server.
        message: String,
    },
}

impl CodecError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "invalid_json",
            Self::NoData => "no_data",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Why a single metric entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum EntryError {
    #[error("no readings")]
    Empty,
    #[error("reading is not a [timestamp, value] pair")]
    NotAPair,
    #[error("timestamp is not a valid epoch-millisecond value")]
    BadTimestamp,
    #[error("value has unsupported type")]
    BadValue,
    #[error("wind direction is not a finite number of degrees")]
    BadDirection,
}

/// JSON codec for the latest-telemetry stream.
#[derive(Debug, Default, Clone)]
pub struct TelemetryCodec {
    formatter: TimestampFormatter,
}

impl TelemetryCodec {
    /// Create a codec that formats timestamps with `formatter`.
    #[must_use]
    pub const fn new(formatter: TimestampFormatter) -> Self {
        Self { formatter }
    }

    /// Build and serialize the subscribe command.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(
        &self,
        credential: &Credential,
        target: &SubscriptionTarget,
    ) -> Result<String, CodecError> {
        let command = SubscribeCommand::latest_telemetry(credential, target);
        Ok(serde_json::to_string(&command)?)
    }

    /// Decode an inbound text frame into the samples it carries.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON frame, the server reported
    /// a subscription error, or the frame has no `data` field.
    pub fn decode(&self, text: &str) -> Result<TelemetryUpdate, CodecError> {
        let frame: TelemetryFrame = serde_json::from_str(text)?;

        if let Some((code, message)) = frame.error() {
            return Err(CodecError::Rejected {
                code,
                message: message.to_string(),
            });
        }

        let data = frame.data.ok_or(CodecError::NoData)?;

        let mut update = TelemetryUpdate::new();
        for metric in Metric::ALL {
            let Some(entry) = data.get(metric.wire_key()) else {
                continue;
            };

            match self.decode_entry(metric, entry) {
                Ok(sample) => update.push(metric, sample),
                Err(e) => {
                    tracing::warn!(metric = %metric, error = %e, "Skipping telemetry entry");
                }
            }
        }

        Ok(update)
    }

    /// Decode the newest reading of one metric.
    fn decode_entry(&self, metric: Metric, entry: &Value) -> Result<MetricSample, EntryError> {
        let newest = entry
            .as_array()
            .ok_or(EntryError::NotAPair)?
            .first()
            .ok_or(EntryError::Empty)?;

        let (ts, raw) = match newest.as_array().map(Vec::as_slice) {
            Some([ts, raw, ..]) => (ts, raw),
            _ => return Err(EntryError::NotAPair),
        };

        let recorded_at = parse_epoch_millis(ts).ok_or(EntryError::BadTimestamp)?;
        let timestamp = self
            .formatter
            .format(recorded_at)
            .ok_or(EntryError::BadTimestamp)?;

        let value = if metric == Metric::WindDirection {
            let degree = parse_number(raw).ok_or(EntryError::BadDirection)?;
            let direction =
                CompassDirection::from_degrees(degree).ok_or(EntryError::BadDirection)?;
            MetricValue::Direction(direction)
        } else {
            parse_value(raw).ok_or(EntryError::BadValue)?
        };

        Ok(MetricSample::new(value, timestamp, recorded_at))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_value(value: &Value) -> Option<MetricValue> {
    match value {
        Value::Number(n) => n.as_f64().map(MetricValue::Number),
        Value::String(s) => Some(
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map_or_else(|| MetricValue::Text(s.clone()), MetricValue::Number),
        ),
        Value::Bool(b) => Some(MetricValue::Text(b.to_string())),
        _ => None,
    }
}
