use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use visitlog_core::{SchemaProfile, ServerConfig};
use visitlog_logging::{
    LogFormat, LogLevel, LogSink, LoggingConfig, LoggingSystem, RecordFileManager,
};
use visitlog_server::{AppState, VisitServer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n  IP_SALT           Secret for IP hashing (required to serve)\n  HOST, PORT        Listen address\n  LOG_TO_FILE       Write daily record files (true/false)\n  LOG_TEXT_FILES    Also write the .txt companion files\n  LOG_DIR           Directory for record files\n  REQUIRE_CONSENT   Reject telemetry without consent: true\n  TELEMETRY_SCHEMA  rich or minimal\n  BODY_LIMIT_BYTES  Request body ceiling\n  LOG_LEVEL, LOG_FORMAT, RUST_LOG  Operational logging on stderr\n\nVisit records go to stdout, one JSON object per line."
)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, help = "Path to configuration file")]
    config: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true, help = "Set operational log level")]
    log_level: Option<String>,

    /// Set log format (json, pretty, compact)
    #[arg(long, global = true, help = "Set operational log format")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the landing page and telemetry endpoint (default)
    Serve(ServeArgs),

    /// List daily record files, newest first
    Files {
        /// Directory to inspect instead of the configured one
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Load and validate configuration, then exit
    CheckConfig(ServeArgs),
}

#[derive(Args, Clone, Debug, Default)]
struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Write daily record files
    #[arg(long, help = "Append records to daily files")]
    file_logging: bool,

    /// Only stdout
    #[arg(long, conflicts_with = "file_logging", help = "Disable daily record files")]
    no_file_logging: bool,

    /// Skip the human-readable .txt files
    #[arg(long, help = "Only write .jsonl record files")]
    no_text_files: bool,

    /// Directory for record files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Reject telemetry that does not carry consent: true
    #[arg(long)]
    require_consent: bool,

    /// Accepted payload shape
    #[arg(long, value_enum)]
    schema: Option<SchemaArg>,

    /// Request body ceiling in bytes
    #[arg(long)]
    body_limit_bytes: Option<usize>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SchemaArg {
    #[value(help = "Nested identifiers, system, network, hardware, features, activity")]
    Rich,
    #[value(help = "Screen dimensions plus locale hints")]
    Minimal,
}

impl From<SchemaArg> for SchemaProfile {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Rich => Self::Rich,
            SchemaArg::Minimal => Self::Minimal,
        }
    }
}

impl ServeArgs {
    /// Flags win over file and environment values
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.no_file_logging {
            config.file_logging = false;
        } else if self.file_logging {
            config.file_logging = true;
        }
        if self.no_text_files {
            config.text_logging = false;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if self.require_consent {
            config.require_consent = true;
        }
        if let Some(schema) = self.schema {
            config.schema = schema.into();
        }
        if let Some(limit) = self.body_limit_bytes {
            config.body_limit_bytes = limit;
        }
    }
}

fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config
        .clone()
        .or_else(|| ServerConfig::default_config_path().ok())
}

/// Create logging configuration from CLI arguments
async fn create_logging_config(cli: &Cli, path: Option<&Path>) -> Result<LoggingConfig> {
    let mut config = LoggingConfig::load(path).await?;

    // Logging is not up yet, so complaints go straight to stderr
    if let Some(level_str) = &cli.log_level {
        match LogLevel::parse(level_str) {
            Some(level) => config.level = level,
            None => eprintln!("Invalid log level '{}', using default", level_str),
        }
    }

    if let Some(format_str) = &cli.log_format {
        match LogFormat::parse(format_str) {
            Some(format) => config.format = format,
            None => eprintln!("Invalid log format '{}', using default", format_str),
        }
    }

    Ok(config)
}

async fn create_server_config(path: Option<&Path>, args: &ServeArgs) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(path).await.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;
    args.apply(&mut config);
    Ok(config)
}

async fn serve(config: ServerConfig) -> Result<()> {
    // Fatal before any socket is bound
    config.validate().map_err(|e| {
        error!(visitlog.event = "config_invalid", error = %e, "Refusing to start");
        anyhow::anyhow!("Invalid configuration: {}", e)
    })?;

    let sink = LogSink::from_config(&config).map_err(|e| {
        error!(visitlog.event = "log_dir_failed", error = %e, "Refusing to start");
        anyhow::anyhow!("Failed to prepare record files: {}", e)
    })?;

    info!(
        visitlog.event = "server_config_loaded",
        schema = %config.schema,
        file_logging = config.file_logging,
        text_logging = config.text_logging,
        require_consent = config.require_consent,
        "Server configuration loaded"
    );

    let state = Arc::new(AppState::new(Arc::new(config), sink));
    VisitServer::new(state)
        .run_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })
}

fn list_files(log_dir: &Path) -> Result<()> {
    let files = RecordFileManager::find_record_files(log_dir)?;

    if files.is_empty() {
        println!("No record files in {}", log_dir.display());
        return Ok(());
    }

    for file in &files {
        println!(
            "{}  {:<5}  {:>12}  {}",
            file.date,
            file.format.extension(),
            file.size,
            file.path.display()
        );
    }
    println!(
        "{} file(s), {} bytes",
        files.len(),
        RecordFileManager::calculate_total_size(&files)
    );

    Ok(())
}

fn check_config(config: &ServerConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // The salt is never serialized
    let rendered = toml::to_string_pretty(config)?;
    println!("{}", rendered);
    println!("Configuration OK");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(visitlog.event = "shutdown_requested", "Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let path = config_path(&cli);

    let logging_config = create_logging_config(&cli, path.as_deref()).await?;
    let _logging_guard = LoggingSystem::init(&logging_config).map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        anyhow::anyhow!("Logging initialization failed: {}", e)
    })?;

    match cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    {
        Command::Serve(args) => {
            let config = create_server_config(path.as_deref(), &args).await?;
            serve(config).await
        }
        Command::Files { log_dir } => {
            let log_dir = match log_dir {
                Some(dir) => dir,
                None => {
                    create_server_config(path.as_deref(), &ServeArgs::default())
                        .await?
                        .log_dir
                }
            };
            list_files(&log_dir)
        }
        Command::CheckConfig(args) => {
            let config = create_server_config(path.as_deref(), &args).await?;
            check_config(&config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;
    use visitlog_core::Salt;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["visitlog"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["visitlog", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve(ref a)) if a.port == Some(8080)));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "visitlog",
            "serve",
            "--file-logging",
            "--no-text-files",
            "--log-dir",
            "/srv/visits",
            "--schema",
            "rich",
            "--require-consent",
        ])
        .unwrap();
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };

        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert!(config.file_logging);
        assert!(!config.text_logging);
        assert_eq!(config.log_dir, PathBuf::from("/srv/visits"));
        assert_eq!(config.schema, SchemaProfile::Rich);
        assert!(config.require_consent);
    }

    #[test]
    fn test_conflicting_file_flags_rejected() {
        let result =
            Cli::try_parse_from(["visitlog", "serve", "--file-logging", "--no-file-logging"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_flags_leave_config_untouched() {
        let mut config = ServerConfig {
            file_logging: true,
            port: 9000,
            ..ServerConfig::default()
        };
        ServeArgs::default().apply(&mut config);

        assert!(config.file_logging);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_check_config_requires_salt() {
        assert!(check_config(&ServerConfig::default()).is_err());

        let config = ServerConfig {
            salt: Salt::new("pepper"),
            ..ServerConfig::default()
        };
        assert!(check_config(&config).is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_serve_refuses_without_salt() {
        std::env::remove_var("IP_SALT");
        let temp_dir = tempfile::TempDir::new().unwrap();
        let absent = temp_dir.path().join("absent.toml");
        let config = create_server_config(Some(&absent), &ServeArgs::default())
            .await
            .unwrap();

        assert!(serve(config).await.is_err());
    }

    #[tokio::test]
    async fn test_serve_refuses_uncreatable_log_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let config = ServerConfig {
            salt: Salt::new("pepper"),
            file_logging: true,
            log_dir: blocker.join("records"),
            ..ServerConfig::default()
        };

        assert!(serve(config).await.is_err());
    }

    #[test]
    fn test_list_files_on_missing_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(list_files(&temp_dir.path().join("none")).is_ok());
    }
}
