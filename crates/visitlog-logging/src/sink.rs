//! Fan-out of visit records to stdout and the daily files

use crate::formatters::{self, RecordFormat};
use crate::rotation::DailyFile;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use visitlog_core::{LogEntry, ServerConfig};

/// Source of "now" for choosing the daily file
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of recording one entry. Failures have already been reported on
/// the operational channel by the time this is returned.
#[derive(Debug, Default)]
pub struct SinkReport {
    pub console_ok: bool,
    pub written: Vec<PathBuf>,
    pub failures: Vec<(RecordFormat, String)>,
}

impl SinkReport {
    pub fn all_ok(&self) -> bool {
        self.console_ok && self.failures.is_empty()
    }

    pub fn failures(&self) -> &[(RecordFormat, String)] {
        &self.failures
    }
}

/// Writes every record to stdout and, when enabled, to daily files.
///
/// Each destination is independent: an error in one is logged and the
/// others are still attempted.
pub struct LogSink {
    console: BoxMakeWriter,
    files: Vec<DailyFile>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl LogSink {
    /// Stdout only
    pub fn console_only() -> Self {
        Self {
            console: BoxMakeWriter::new(std::io::stdout),
            files: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build the sink for a deployment. The log directory is created here,
    /// once; failure is returned to the caller as fatal.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut sink = Self::console_only();

        if !config.file_logging {
            return Ok(sink);
        }

        std::fs::create_dir_all(&config.log_dir).map_err(|source| Error::LogDirectory {
            path: config.log_dir.clone(),
            source,
        })?;

        sink.files
            .push(DailyFile::new(&config.log_dir, RecordFormat::JsonLines));
        if config.text_logging {
            sink.files.push(DailyFile::new(&config.log_dir, RecordFormat::Text));
        }

        tracing::info!(
            visitlog.event = "record_files_enabled",
            log_dir = %config.log_dir.display(),
            text = config.text_logging,
            "Record files enabled"
        );

        Ok(sink)
    }

    /// Replace the stdout destination
    pub fn with_console(mut self, console: BoxMakeWriter) -> Self {
        self.console = console;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist one entry everywhere it belongs
    pub async fn record(&self, entry: &LogEntry) -> SinkReport {
        let mut report = SinkReport::default();

        let line = match formatters::json_line(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(
                    visitlog.event = "record_render_failed",
                    error = %e,
                    "Failed to serialize record"
                );
                report
                    .failures
                    .push((RecordFormat::JsonLines, e.to_string()));
                return report;
            }
        };

        report.console_ok = match self.write_console(&line) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    visitlog.event = "record_write_failed",
                    sink = "stdout",
                    error = %e,
                    "Failed to write record to stdout"
                );
                false
            }
        };

        if self.files.is_empty() {
            return report;
        }

        let now = self.clock.now();
        for file in &self.files {
            match Self::write_file(file, now, entry).await {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    tracing::error!(
                        visitlog.event = "record_write_failed",
                        sink = file.format().extension(),
                        path = %file.path_for(now.date_naive()).display(),
                        error = %e,
                        "Failed to append record"
                    );
                    report.failures.push((file.format(), e.to_string()));
                }
            }
        }

        report
    }

    fn write_console(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.console.make_writer();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }

    async fn write_file(file: &DailyFile, now: DateTime<Utc>, entry: &LogEntry) -> Result<PathBuf> {
        let record = file.format().render(entry)?;
        file.append(now, record.as_bytes()).await
    }
}
