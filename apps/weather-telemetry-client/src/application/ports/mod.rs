//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SessionProvider`: login token and subscription target lookup

use async_trait::async_trait;

use crate::domain::session::{Credential, SubscriptionTarget};

/// Errors raised while resolving the session inputs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login call was rejected.
    #[error("login failed ({status}): {message}")]
    LoginFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Settings lookup was rejected.
    #[error("settings lookup failed ({status}): {message}")]
    SettingsFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Network-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Settings lookup returned no subscription target.
    #[error("no subscription target configured")]
    ConfigMissing,
}

/// Source of the login token and subscription targets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Obtain an auth token.
    async fn credential(&self) -> Result<Credential, SessionError>;

    /// Look up the subscription target candidates.
    ///
    /// An empty list means the widget is not configured.
    async fn subscription_targets(
        &self,
        credential: &Credential,
    ) -> Result<Vec<SubscriptionTarget>, SessionError>;
}
