//! Session Provider Adapters
//!
//! [`HttpSessionProvider`] performs the two lookups a mount needs:
//!
//! 1. `POST {api_url}/api/auth/login` with `{"username","password"}`,
//!    answered with `{"token": "...", "refreshToken": "..."}`.
//! 2. `GET {settings_url}` with the token in `X-Authorization`, answered with
//!    `{"data": [{"entityType": "...", "entityId": "..."}]}`. A missing, null
//!    or empty `data` list means nothing is configured.
//!
//! Each call is attempted once; there is no token refresh.
//!
//! [`StaticSessionProvider`] returns fixed values and is used for tests and
//! offline runs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{SessionError, SessionProvider};
use crate::domain::session::{Credential, SubscriptionTarget};
use crate::infrastructure::config::{ClientConfig, LoginCredentials};

/// Login path relative to the API base URL.
const LOGIN_PATH: &str = "/api/auth/login";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    data: Option<Vec<SubscriptionTarget>>,
}

/// HTTP session provider for the telemetry platform.
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    client: Client,
    login_url: String,
    settings_url: String,
    login: LoginCredentials,
}

impl HttpSessionProvider {
    /// Create a provider from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(config.http.timeout)
            .build()
            .map_err(|e| SessionError::Network(e.to_string()))?;

        Ok(Self {
            client,
            login_url: format!("{}{LOGIN_PATH}", config.endpoints.api_url),
            settings_url: config.endpoints.settings_url.clone(),
            login: config.login.clone(),
        })
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn credential(&self) -> Result<Credential, SessionError> {
        tracing::debug!(url = %self.login_url, "Requesting login token");

        let response = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest {
                username: self.login.username(),
                password: self.login.password(),
            })
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SessionError::LoginFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;

        if body.token.is_empty() {
            return Err(SessionError::InvalidResponse(
                "login response has an empty token".to_string(),
            ));
        }

        Ok(Credential::new(body.token))
    }

    async fn subscription_targets(
        &self,
        credential: &Credential,
    ) -> Result<Vec<SubscriptionTarget>, SessionError> {
        tracing::debug!(url = %self.settings_url, "Reading widget settings");

        let response = self
            .client
            .get(&self.settings_url)
            .header("X-Authorization", format!("Bearer {}", credential.token()))
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SessionError::SettingsFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: SettingsResponse = response
            .json()
            .await
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;

        Ok(body.data.unwrap_or_default())
    }
}

/// Session provider returning fixed values.
#[derive(Debug, Clone)]
pub struct StaticSessionProvider {
    credential: Credential,
    targets: Vec<SubscriptionTarget>,
}

impl StaticSessionProvider {
    /// Create a provider with a fixed token and target list.
    #[must_use]
    pub const fn new(credential: Credential, targets: Vec<SubscriptionTarget>) -> Self {
        Self {
            credential,
            targets,
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn credential(&self) -> Result<Credential, SessionError> {
        Ok(self.credential.clone())
    }

    async fn subscription_targets(
        &self,
        _credential: &Credential,
    ) -> Result<Vec<SubscriptionTarget>, SessionError> {
        Ok(self.targets.clone())
    }
}
