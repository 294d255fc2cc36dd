//! # Visitlog Logging
//!
//! Persistence for visit records plus the operational log channel.
//!
//! ## Features
//!
//! - **Record sink**: every [`LogEntry`](visitlog_core::LogEntry) goes to
//!   stdout as one JSON line, and optionally to daily files
//! - **Daily rotation**: `visits-<YYYY-MM-DD>.jsonl` and `.txt`, keyed by the
//!   UTC date at write time
//! - **Failure isolation**: a failing file never blocks stdout or its sibling
//! - **Operational logging**: `tracing` subscriber on stderr, JSON, pretty
//!   or compact
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use visitlog_core::{EventKind, LogEntryBuilder, ServerConfig};
//! use visitlog_logging::LogSink;
//!
//! # async fn run() -> visitlog_logging::Result<()> {
//! let sink = LogSink::from_config(&ServerConfig::default())?;
//! let entry = LogEntryBuilder::new(EventKind::Pageview, "GET", "/").build();
//! sink.record(&entry).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod formatters;
pub mod rotation;
pub mod sink;
pub mod system;

pub use config::{LogFormat, LogLevel, LoggingConfig};
pub use formatters::RecordFormat;
pub use rotation::{DailyFile, RecordFileInfo, RecordFileManager};
pub use sink::{Clock, LogSink, SinkReport, SystemClock};
pub use system::{LoggingGuard, LoggingSystem};

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Logging-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Log directory {path} could not be created: {source}")]
    LogDirectory {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logging system error: {message}")]
    System { message: String },
}
