//! Path tracking and error collection while walking a payload.

use serde::Serialize;

/// Root of a payload in field paths
pub const ROOT_PATH: &str = "$";

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dot/bracket path of the offending field, e.g. `hardware.battery.level`
    pub path: String,
    /// Violated constraint
    pub message: String,
}

/// Every violation found in one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("telemetry payload rejected with {} violation(s)", .details.len())]
pub struct ValidationReport {
    pub details: Vec<FieldError>,
}

impl ValidationReport {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            details: vec![FieldError {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// Paths of all violations, in the order they were found
    pub fn paths(&self) -> Vec<&str> {
        self.details.iter().map(|e| e.path.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Tracks where in the payload the walker currently is.
#[derive(Debug, Default)]
pub struct ValidationContext {
    path: Vec<Segment>,
    errors: Vec<FieldError>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_key(&mut self, key: impl Into<String>) {
        self.path.push(Segment::Key(key.into()));
    }

    pub fn enter_index(&mut self, index: usize) {
        self.path.push(Segment::Index(index));
    }

    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Current path, `$` at the root
    pub fn current_path(&self) -> String {
        if self.path.is_empty() {
            return ROOT_PATH.to_string();
        }

        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Segment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Record a violation at the current path
    pub fn fail(&mut self, message: impl Into<String>) {
        let path = self.current_path();
        self.errors.push(FieldError {
            path,
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport {
                details: self.errors,
            })
        }
    }
}
