//! Domain types for visitlog: the pieces that turn an inbound request into
//! an immutable [`LogEntry`](entry::LogEntry).
//!
//! Request flow: [`ip::normalize_client_ip`] → [`ip::IpHasher`], alongside
//! [`user_agent::classify`], folded together by [`entry::LogEntryBuilder`].
//! Client payloads pass through [`schema::TelemetryValidator`] first.

pub mod config;
pub mod entry;
pub mod error;
pub mod ip;
pub mod schema;
pub mod user_agent;

pub use config::{Salt, SchemaProfile, ServerConfig};
pub use entry::{EventKind, LogEntry, LogEntryBuilder};
pub use error::{Result, VisitlogError};
pub use schema::{TelemetryPayload, TelemetryValidator, ValidationReport};
pub use user_agent::ParsedUserAgent;
