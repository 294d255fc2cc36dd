//! Daily record files

use crate::formatters::RecordFormat;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name prefix shared by every record file
pub const FILE_PREFIX: &str = "visits-";

/// Append-only file family keyed by UTC date, one per [`RecordFormat`].
///
/// The target path is recomputed on every append, so the first record after
/// midnight UTC lands in the next day's file without any rotation state.
#[derive(Debug, Clone)]
pub struct DailyFile {
    dir: PathBuf,
    format: RecordFormat,
}

impl DailyFile {
    pub fn new(dir: impl Into<PathBuf>, format: RecordFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// `visits-YYYY-MM-DD.<ext>` inside the record directory
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}",
            FILE_PREFIX,
            date.format("%Y-%m-%d"),
            self.format.extension()
        ))
    }

    /// Append one complete record to the file for `now`'s UTC date.
    ///
    /// The record goes out as a single append on an `O_APPEND` handle, so
    /// concurrent writers never interleave within a record.
    pub async fn append(&self, now: DateTime<Utc>, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(now.date_naive());

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(path)
    }
}

/// Information about a record file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFileInfo {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub format: RecordFormat,
    pub size: u64,
}

/// Utility functions for record file discovery
pub struct RecordFileManager;

impl RecordFileManager {
    /// Record files in `dir`, newest date first. Unrelated files are skipped
    /// and a missing directory yields an empty list.
    pub fn find_record_files(dir: &Path) -> Result<Vec<RecordFileInfo>> {
        let mut files = Vec::new();

        if !dir.exists() {
            return Ok(files);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some((date, format)) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(Self::parse_file_name)
            else {
                continue;
            };

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            files.push(RecordFileInfo {
                path,
                date,
                format,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| b.date.cmp(&a.date).then(a.format.cmp(&b.format)));
        Ok(files)
    }

    /// Total size of the given files in bytes
    pub fn calculate_total_size(files: &[RecordFileInfo]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }

    fn parse_file_name(name: &str) -> Option<(NaiveDate, RecordFormat)> {
        let rest = name.strip_prefix(FILE_PREFIX)?;
        let (date, extension) = rest.split_once('.')?;
        let format = RecordFormat::from_extension(extension)?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some((date, format))
    }
}
