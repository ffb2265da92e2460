//! Telemetry platform adapters.
//!
//! - `rest`: login and widget settings lookup
//! - `messages`: wire types for the subscribe command and telemetry frames
//! - `codec`: encode/decode between wire text and domain types
//! - `session_machine`: transport-free connection state machine
//! - `client`: WebSocket driver for the state machine

pub mod client;
pub mod codec;
pub mod messages;
pub mod rest;
pub mod session_machine;

pub use client::{ClientError, SessionReport, SocketClient, SocketClientConfig};
pub use codec::{CodecError, TelemetryCodec};
pub use rest::{HttpSessionProvider, StaticSessionProvider};
pub use session_machine::{SessionMachine, SocketCommand, SocketEvent, Step};
