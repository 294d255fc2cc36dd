//! Operational logging configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

/// Settings for the operational (stderr) log channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: LogLevel,

    /// Output format (JSON, Pretty, Compact)
    pub format: LogFormat,

    /// Include source location in logs
    pub include_location: bool,

    /// Include thread names/IDs
    pub include_thread_info: bool,

    /// Colour output
    pub ansi: bool,
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Structured JSON format
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            include_location: false,
            include_thread_info: false,
            ansi: false,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    logging: LoggingConfig,
}

impl LoggingConfig {
    /// Load the `[logging]` table of a TOML file, or defaults when the file
    /// is absent. Environment overrides are applied afterwards.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = tokio::fs::read_to_string(path).await?;
                Self::from_toml_str(&content)?
            }
            _ => Self::default(),
        };

        config.load_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: ConfigDocument = toml::from_str(content).map_err(|e| Error::Config {
            message: format!("Failed to parse logging config: {}", e),
        })?;
        Ok(document.logging)
    }

    /// Load environment variable overrides
    pub fn load_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = LogLevel::parse(&level).unwrap_or(self.level);
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = LogFormat::parse(&format).unwrap_or(self.format);
        }
    }
}
