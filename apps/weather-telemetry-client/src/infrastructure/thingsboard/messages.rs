//! Telemetry Platform WebSocket Message Types
//!
//! Wire format types for the platform's telemetry WebSocket API.
//!
//! # Outbound
//!
//! One subscribe command per connection, sent right after the socket opens.
//! It carries the auth token and a latest-telemetry timeseries subscription:
//!
//! ```json
//! {
//!   "authCmd": {"cmdId": 0, "token": "..."},
//!   "cmds": [{
//!     "entityType": "DEVICE",
//!     "entityId": "...",
//!     "scope": "LATEST_TELEMETRY",
//!     "cmdId": 10,
//!     "type": "TIMESERIES"
//!   }]
//! }
//! ```
//!
//! # Inbound
//!
//! Telemetry frames map metric keys to `[epochMillis, value]` pairs, newest
//! first. The server may send any subset of keys in a frame:
//!
//! ```json
//! {"subscriptionId": 10, "errorCode": 0, "errorMsg": null,
//!  "data": {"temperature": [[1700000000000, "23.4"]]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::session::{Credential, SubscriptionTarget};

/// Command id of the auth command.
pub const AUTH_CMD_ID: u32 = 0;

/// Command id of the timeseries subscription.
pub const SUBSCRIPTION_CMD_ID: u32 = 10;

/// Scope requesting only the newest value per key.
pub const LATEST_TELEMETRY_SCOPE: &str = "LATEST_TELEMETRY";

/// Command type for timeseries subscriptions.
pub const TIMESERIES_CMD_TYPE: &str = "TIMESERIES";

// =============================================================================
// Outbound
// =============================================================================

/// Auth command embedded in the subscribe message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCmd {
    /// Command id (always 0).
    pub cmd_id: u32,
    /// Auth token.
    pub token: String,
}

/// Timeseries subscription command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesCmd {
    /// Entity type of the subscribed entity.
    pub entity_type: String,
    /// Entity id of the subscribed entity.
    pub entity_id: String,
    /// Subscription scope.
    pub scope: String,
    /// Command id, echoed back as `subscriptionId`.
    pub cmd_id: u32,
    /// Command type.
    #[serde(rename = "type")]
    pub cmd_type: String,
}

/// Complete subscribe message sent once per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeCommand {
    /// Auth command.
    pub auth_cmd: AuthCmd,
    /// Subscription commands.
    pub cmds: Vec<TimeseriesCmd>,
}

impl SubscribeCommand {
    /// Build the latest-telemetry subscription for a target.
    #[must_use]
    pub fn latest_telemetry(credential: &Credential, target: &SubscriptionTarget) -> Self {
        Self {
            auth_cmd: AuthCmd {
                cmd_id: AUTH_CMD_ID,
                token: credential.token().to_string(),
            },
            cmds: vec![TimeseriesCmd {
                entity_type: target.entity_type.clone(),
                entity_id: target.entity_id.clone(),
                scope: LATEST_TELEMETRY_SCOPE.to_string(),
                cmd_id: SUBSCRIPTION_CMD_ID,
                cmd_type: TIMESERIES_CMD_TYPE.to_string(),
            }],
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Raw inbound telemetry frame.
///
/// Entries under `data` are kept as raw JSON so one malformed metric does not
/// invalidate the rest of the frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    /// Command id of the subscription this frame belongs to.
    #[serde(default)]
    pub subscription_id: Option<i64>,

    /// Non-zero when the server rejected the subscription.
    #[serde(default)]
    pub error_code: Option<i32>,

    /// Server error description.
    #[serde(default)]
    pub error_msg: Option<String>,

    /// Metric key to `[epochMillis, value]` pairs, newest first.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl TelemetryFrame {
    /// Server error carried by this frame, if any.
    #[must_use]
    pub fn error(&self) -> Option<(i32, &str)> {
        match self.error_code {
            Some(code) if code != 0 => Some((code, self.error_msg.as_deref().unwrap_or(""))),
            _ => None,
        }
    }
}
