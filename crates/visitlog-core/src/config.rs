//! Server configuration, built once at startup and shared read-only.

use crate::{Result, VisitlogError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable holding the IP hashing salt.
pub const SALT_ENV: &str = "IP_SALT";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Listening port
    pub port: u16,

    /// Secret mixed into every IP hash
    #[serde(skip_serializing)]
    pub salt: Salt,

    /// Append records to daily files in `log_dir`
    pub file_logging: bool,

    /// Also write the human-readable `.txt` companion file
    pub text_logging: bool,

    /// Directory for daily record files
    pub log_dir: PathBuf,

    /// Reject telemetry that does not carry `consent: true`
    pub require_consent: bool,

    /// Which payload shape this deployment accepts
    pub schema: SchemaProfile,

    /// Request body ceiling in bytes
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            salt: Salt::default(),
            file_logging: false,
            text_logging: true,
            log_dir: PathBuf::from("./logs"),
            require_consent: false,
            schema: SchemaProfile::Minimal,
            body_limit_bytes: 64 * 1024,
        }
    }
}

/// Server-held secret for IP hashing. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt([REDACTED])")
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Accepted telemetry payload shape, chosen per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaProfile {
    /// Nested identifiers, system, network, hardware, features, activity
    Rich,
    /// Screen dimensions plus locale hints
    Minimal,
}

impl SchemaProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaProfile::Rich => "rich",
            SchemaProfile::Minimal => "minimal",
        }
    }
}

impl fmt::Display for SchemaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaProfile {
    type Err = VisitlogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rich" | "full" => Ok(SchemaProfile::Rich),
            "minimal" | "basic" => Ok(SchemaProfile::Minimal),
            other => Err(VisitlogError::config(format!(
                "unknown telemetry schema '{}', expected 'rich' or 'minimal'",
                other
            ))),
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    /// Load the `[server]` table from a TOML file, falling back to defaults
    /// when no file exists. Environment overrides are applied afterwards.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path().ok(),
        };

        let mut config = match config_file {
            Some(file) if file.exists() => {
                let content = tokio::fs::read_to_string(&file).await?;
                Self::from_toml_str(&content)?
            }
            _ => Self::default(),
        };

        config.load_env_overrides();
        Ok(config)
    }

    /// Parse the `[server]` table of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: ConfigDocument = toml::from_str(content).map_err(|e| {
            VisitlogError::config(format!("Failed to parse server config: {}", e))
        })?;
        Ok(document.server)
    }

    /// Apply environment variable overrides
    pub fn load_env_overrides(&mut self) {
        if let Ok(salt) = std::env::var(SALT_ENV) {
            self.salt = Salt::new(salt);
        }

        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            self.port = port.trim().parse().unwrap_or(self.port);
        }

        if let Ok(enabled) = std::env::var("LOG_TO_FILE") {
            self.file_logging = parse_flag(&enabled).unwrap_or(self.file_logging);
        }

        if let Ok(enabled) = std::env::var("LOG_TEXT_FILES") {
            self.text_logging = parse_flag(&enabled).unwrap_or(self.text_logging);
        }

        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(required) = std::env::var("REQUIRE_CONSENT") {
            self.require_consent = parse_flag(&required).unwrap_or(self.require_consent);
        }

        if let Ok(schema) = std::env::var("TELEMETRY_SCHEMA") {
            match schema.parse() {
                Ok(profile) => self.schema = profile,
                Err(e) => tracing::warn!(error = %e, "Ignoring TELEMETRY_SCHEMA override"),
            }
        }

        if let Ok(limit) = std::env::var("BODY_LIMIT_BYTES") {
            self.body_limit_bytes = limit.trim().parse().unwrap_or(self.body_limit_bytes);
        }
    }

    /// Validate configuration. A missing salt is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.salt.is_empty() {
            return Err(VisitlogError::MissingSetting {
                name: SALT_ENV.to_string(),
            });
        }

        if self.port == 0 {
            return Err(VisitlogError::config("port must be greater than 0"));
        }

        if self.body_limit_bytes == 0 {
            return Err(VisitlogError::config(
                "body_limit_bytes must be greater than 0",
            ));
        }

        self.host.parse::<IpAddr>().map_err(|e| {
            VisitlogError::config(format!("Invalid host '{}': {}", self.host, e))
        })?;

        Ok(())
    }

    /// Socket address to listen on
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            VisitlogError::config(format!("Invalid host '{}': {}", self.host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "visitlog", "visitlog")
            .ok_or_else(|| VisitlogError::config("Could not determine config directory"))?;

        Ok(project_dirs.config_dir().join("visitlog.toml"))
    }
}

/// Parse an on/off environment value
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
