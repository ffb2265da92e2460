//! Client Configuration Settings
//!
//! Configuration types for the telemetry client, loaded once from
//! environment variables and passed into constructors.

use std::time::Duration;

use chrono::FixedOffset;

use crate::domain::timestamp::TimestampFormatter;

/// What to do with frames that cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log and drop the frame; keep the connection.
    #[default]
    SilentDegrade,
    /// Close the connection and report the frame error to the caller.
    FailFast,
}

impl ErrorPolicy {
    /// Parse policy from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Self::FailFast,
            _ => Self::SilentDegrade,
        }
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SilentDegrade => "silent-degrade",
            Self::FailFast => "fail-fast",
        }
    }
}

/// Platform login credentials.
#[derive(Clone)]
pub struct LoginCredentials {
    username: String,
    password: String,
}

impl LoginCredentials {
    /// Create new login credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Platform endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    /// WebSocket URL, used verbatim.
    pub endpoint_url: String,
    /// REST API base URL.
    pub api_url: String,
    /// Settings lookup URL.
    pub settings_url: String,
}

/// Display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Pinned timezone for formatted timestamps.
    pub utc_offset: FixedOffset,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            utc_offset: TimestampFormatter::utc().offset(),
        }
    }
}

impl DisplaySettings {
    /// Formatter pinned to the configured offset.
    #[must_use]
    pub const fn formatter(&self) -> TimestampFormatter {
        TimestampFormatter::new(self.utc_offset)
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// HTTP settings for the session calls.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Platform endpoints.
    pub endpoints: EndpointSettings,
    /// Login credentials.
    pub login: LoginCredentials,
    /// Display settings.
    pub display: DisplaySettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// HTTP settings.
    pub http: HttpSettings,
    /// Frame error policy.
    pub error_policy: ErrorPolicy,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// empty, or if the display offset cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint_url = required(&lookup, "TB_WS_URL")?;
        let api_url = required(&lookup, "TB_API_URL")?;
        let username = required(&lookup, "TB_USERNAME")?;
        let password = required(&lookup, "TB_PASSWORD")?;

        let api_url = api_url.trim_end_matches('/').to_string();
        let settings_url = lookup("WEATHER_SETTINGS_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{api_url}/api/settings"));

        let utc_offset = match lookup("WEATHER_UTC_OFFSET").filter(|v| !v.is_empty()) {
            Some(raw) => raw.trim().parse::<FixedOffset>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "WEATHER_UTC_OFFSET".to_string(),
                    value: raw.clone(),
                }
            })?,
            None => DisplaySettings::default().utc_offset,
        };

        let server = ServerSettings {
            health_port: parse_or(
                &lookup,
                "WEATHER_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let http = HttpSettings {
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "WEATHER_HTTP_TIMEOUT_SECS",
                HttpSettings::default().timeout.as_secs(),
            )),
        };

        let error_policy = lookup("WEATHER_ERROR_POLICY")
            .map(|s| ErrorPolicy::from_str_case_insensitive(&s))
            .unwrap_or_default();

        Ok(Self {
            endpoints: EndpointSettings {
                endpoint_url,
                api_url,
                settings_url,
            },
            login: LoginCredentials::new(username, password),
            display: DisplaySettings { utc_offset },
            server,
            http,
            error_policy,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
