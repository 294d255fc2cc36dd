//! Record renderers: one JSON line, or a fixed human-readable block

use crate::Result;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use visitlog_core::LogEntry;

/// Width of the separator line that closes a text block
pub const SEPARATOR_WIDTH: usize = 80;

/// Keys rendered by dedicated sections of the text block
const SECTION_KEYS: [&str; 8] = [
    "timestamp",
    "method",
    "path",
    "hashedIp",
    "headers",
    "userAgent",
    "event",
    "telemetry",
];

/// On-disk record format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordFormat {
    /// One JSON object per line (`.jsonl`)
    JsonLines,
    /// Fixed block layout for humans (`.txt`)
    Text,
}

impl RecordFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::JsonLines => "jsonl",
            RecordFormat::Text => "txt",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "jsonl" => Some(RecordFormat::JsonLines),
            "txt" => Some(RecordFormat::Text),
            _ => None,
        }
    }

    pub fn render(&self, entry: &LogEntry) -> Result<String> {
        match self {
            RecordFormat::JsonLines => json_line(entry),
            RecordFormat::Text => text_block(entry),
        }
    }
}

/// Single-line JSON terminated by `\n`
pub fn json_line(entry: &LogEntry) -> Result<String> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    Ok(line)
}

/// Human-readable block. Section order is fixed so that historical files
/// diff cleanly.
pub fn text_block(entry: &LogEntry) -> Result<String> {
    let Value::Object(mut fields) = serde_json::to_value(entry)? else {
        return Err(crate::Error::System {
            message: "log entry did not serialize to an object".to_string(),
        });
    };

    for key in SECTION_KEYS {
        fields.remove(key);
    }
    let residual: Map<String, Value> = fields;

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "[{}]", entry.timestamp_string());
    let _ = writeln!(out, "{} {}", entry.method(), entry.path());
    let _ = writeln!(out, "Hashed IP: {}", entry.hashed_ip().unwrap_or("unknown"));
    let _ = writeln!(out, "Headers:");
    let _ = writeln!(out, "{}", serde_json::to_string_pretty(entry.headers())?);
    let _ = writeln!(out, "User-Agent:");
    let _ = writeln!(out, "{}", serde_json::to_string_pretty(entry.user_agent())?);
    let _ = writeln!(out, "Event: {}", entry.event());

    if let Some(telemetry) = entry.telemetry() {
        let _ = writeln!(out, "Telemetry:");
        let _ = writeln!(out, "{}", serde_json::to_string_pretty(telemetry)?);
    }

    if !residual.is_empty() {
        let _ = writeln!(out, "Additional Fields:");
        let _ = writeln!(out, "{}", serde_json::to_string_pretty(&residual)?);
    }

    let _ = writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));
    out.push('\n');
    Ok(out)
}
