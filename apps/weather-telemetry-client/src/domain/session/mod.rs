//! Session Types
//!
//! The two inputs a stream session needs before a socket is opened: the
//! auth token from the login call and the entity whose telemetry is
//! subscribed to. Both are fetched once per mount and never change for the
//! lifetime of the connection.

use serde::{Deserialize, Serialize};

/// Auth token issued by the platform login call.
///
/// The `Debug` implementation redacts the token for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Create a credential from a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Get the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Entity whose latest telemetry is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTarget {
    /// Platform entity type, e.g. `DEVICE`.
    pub entity_type: String,
    /// Platform entity id.
    pub entity_id: String,
}

impl SubscriptionTarget {
    /// Create a new subscription target.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}
