//! Operational log channel setup.
//!
//! Operational events go to stderr so that stdout carries nothing but
//! visit records.

use crate::{
    config::{LogFormat, LoggingConfig},
    Error, Result,
};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Installs the global `tracing` subscriber
pub struct LoggingSystem;

/// Flushes buffered operational logs when dropped
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

impl LoggingSystem {
    /// Initialize operational logging with the given configuration
    pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
        let (writer, worker) = tracing_appender::non_blocking(std::io::stderr());

        let filter = Self::build_env_filter(config)?;
        let layer = Self::build_layer(config, writer).with_filter(filter);

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| Error::System {
                message: format!("Failed to initialize tracing subscriber: {}", e),
            })?;

        tracing::info!(
            visitlog.event = "logging_initialized",
            version = env!("CARGO_PKG_VERSION"),
            level = ?config.level,
            format = ?config.format,
            "Operational logging initialized"
        );

        Ok(LoggingGuard { _worker: worker })
    }

    /// Build environment filter for log level filtering
    pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
        if let Ok(env_filter) = std::env::var("RUST_LOG") {
            return EnvFilter::try_new(env_filter).map_err(|e| Error::Config {
                message: format!("Invalid RUST_LOG directive: {}", e),
            });
        }

        let level: Level = config.level.into();
        let mut filter = EnvFilter::new(level.to_string());

        for directive in ["hyper=warn", "h2=warn", "tower=warn"] {
            let directive = directive.parse().map_err(|e| Error::Config {
                message: format!("Invalid filter directive '{}': {}", directive, e),
            })?;
            filter = filter.add_directive(directive);
        }

        Ok(filter)
    }

    fn build_layer(
        config: &LoggingConfig,
        writer: NonBlocking,
    ) -> Box<dyn Layer<Registry> + Send + Sync> {
        match config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_info)
                .with_thread_names(config.include_thread_info)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_ansi(config.ansi)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_info)
                .with_thread_names(config.include_thread_info)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(config.ansi)
                .with_target(false)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_info)
                .with_thread_names(config.include_thread_info)
                .boxed(),
        }
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::debug!(
            visitlog.event = "logging_shutdown",
            "Operational logging shutting down"
        );
    }
}
