//! Configuration Module
//!
//! Configuration loading for the telemetry client.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, DisplaySettings, EndpointSettings, ErrorPolicy, HttpSettings,
    LoginCredentials, ServerSettings,
};
