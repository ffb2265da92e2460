//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `WidgetMount`: resolves the session and owns one socket session
//! - `ConnectionHealth`: connection status observed by the health server

mod health;
mod mount;

pub use health::ConnectionHealth;
pub use mount::{MountContext, MountError, WidgetMount};
