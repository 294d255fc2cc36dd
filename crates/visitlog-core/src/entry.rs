//! The immutable per-request record and its builder

use crate::ip::IpHasher;
use crate::schema::TelemetryPayload;
use crate::user_agent::{self, ParsedUserAgent};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Request headers copied into records. Everything else is dropped.
pub const HEADER_ALLOW_LIST: [&str; 3] = ["user-agent", "referer", "accept-language"];

/// Keys owned by the fixed part of a record
const RESERVED_KEYS: [&str; 8] = [
    "timestamp",
    "method",
    "path",
    "hashedIp",
    "headers",
    "userAgent",
    "event",
    "telemetry",
];

/// What triggered a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pageview,
    Telemetry,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pageview => "pageview",
            EventKind::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per request. Fields serialize in declaration order, with
/// residual fields appended in key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    method: String,
    path: String,
    hashed_ip: Option<String>,
    headers: BTreeMap<String, String>,
    user_agent: ParsedUserAgent,
    event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    telemetry: Option<TelemetryPayload>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

/// RFC 3339, millisecond precision, `Z` suffix
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl LogEntry {
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hashed_ip(&self) -> Option<&str> {
        self.hashed_ip.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn user_agent(&self) -> &ParsedUserAgent {
        &self.user_agent
    }

    pub fn event(&self) -> EventKind {
        self.event
    }

    pub fn telemetry(&self) -> Option<&TelemetryPayload> {
        self.telemetry.as_ref()
    }

    /// Fields beyond the fixed record layout
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

/// Assembles a [`LogEntry`] from request data
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    event: EventKind,
    method: String,
    path: String,
    hashed_ip: Option<String>,
    headers: BTreeMap<String, String>,
    telemetry: Option<TelemetryPayload>,
    extra: BTreeMap<String, Value>,
}

impl LogEntryBuilder {
    pub fn new(event: EventKind, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            event,
            method: method.into(),
            path: path.into(),
            hashed_ip: None,
            headers: BTreeMap::new(),
            telemetry: None,
            extra: BTreeMap::new(),
        }
    }

    /// Hash the normalized client IP; an empty IP leaves `hashedIp` null
    pub fn client_ip(mut self, ip: &str, hasher: &IpHasher) -> Self {
        self.hashed_ip = hasher.hash(ip);
        self
    }

    /// Keep a request header if it is on the allow-list. The first value
    /// seen for a name wins.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if HEADER_ALLOW_LIST.contains(&name.as_str()) {
            self.headers
                .entry(name)
                .or_insert_with(|| value.to_string());
        }
        self
    }

    pub fn headers<'a, I>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    pub fn telemetry(mut self, payload: TelemetryPayload) -> Self {
        self.telemetry = Some(payload);
        self
    }

    /// Attach a residual field. Keys that clash with the fixed layout are ignored.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::debug!(key = %key, "Ignoring residual field that shadows a record field");
        } else {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Build with the current UTC time
    pub fn build(self) -> LogEntry {
        self.build_at(Utc::now())
    }

    pub fn build_at(self, timestamp: DateTime<Utc>) -> LogEntry {
        let user_agent = user_agent::classify(self.headers.get("user-agent").map(String::as_str));

        LogEntry {
            timestamp,
            method: self.method,
            path: self.path,
            hashed_ip: self.hashed_ip,
            headers: self.headers,
            user_agent,
            event: self.event,
            telemetry: self.telemetry,
            extra: self.extra,
        }
    }
}
