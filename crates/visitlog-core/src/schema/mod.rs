//! Strict validation of client-submitted telemetry.
//!
//! A payload is accepted or rejected as a whole. Accepted payloads are kept
//! exactly as received; rejected ones produce a [`ValidationReport`] listing
//! every violated field path.

mod context;
mod profiles;
mod rules;

pub use context::{FieldError, ValidationContext, ValidationReport, ROOT_PATH};
pub use rules::{ObjectRule, Rule};

use crate::config::SchemaProfile;
use serde::Serialize;
use serde_json::{Map, Value};

/// A payload that passed validation, tagged with the shape it matched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryPayload {
    Rich(Map<String, Value>),
    Minimal(Map<String, Value>),
}

impl TelemetryPayload {
    pub fn profile(&self) -> SchemaProfile {
        match self {
            TelemetryPayload::Rich(_) => SchemaProfile::Rich,
            TelemetryPayload::Minimal(_) => SchemaProfile::Minimal,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        match self {
            TelemetryPayload::Rich(map) | TelemetryPayload::Minimal(map) => map,
        }
    }

    /// The client's consent flag, if it sent one
    pub fn consent(&self) -> Option<bool> {
        self.fields().get("consent").and_then(Value::as_bool)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields().clone())
    }
}

/// Validator for the deployment's active payload shape
#[derive(Debug, Clone)]
pub struct TelemetryValidator {
    profile: SchemaProfile,
    schema: ObjectRule,
    require_consent: bool,
}

impl TelemetryValidator {
    pub fn new(profile: SchemaProfile) -> Self {
        let schema = match profile {
            SchemaProfile::Rich => profiles::rich(),
            SchemaProfile::Minimal => profiles::minimal(),
        };

        Self {
            profile,
            schema,
            require_consent: false,
        }
    }

    /// Reject payloads that do not carry `consent: true`
    pub fn with_required_consent(mut self, required: bool) -> Self {
        self.require_consent = required;
        self
    }

    pub fn profile(&self) -> SchemaProfile {
        self.profile
    }

    /// Validate raw body bytes
    pub fn validate_slice(&self, body: &[u8]) -> Result<TelemetryPayload, ValidationReport> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ValidationReport::single(ROOT_PATH, "body is not valid JSON"))?;
        self.validate(value)
    }

    /// Validate a parsed payload
    pub fn validate(&self, value: Value) -> Result<TelemetryPayload, ValidationReport> {
        let Value::Object(map) = value else {
            return Err(ValidationReport::single(ROOT_PATH, "expected object"));
        };

        let mut ctx = ValidationContext::new();
        self.schema.check_map(&map, &mut ctx);
        ctx.into_result()?;

        let payload = match self.profile {
            SchemaProfile::Rich => TelemetryPayload::Rich(map),
            SchemaProfile::Minimal => TelemetryPayload::Minimal(map),
        };

        if self.require_consent && payload.consent() != Some(true) {
            return Err(ValidationReport::single("consent", "consent required"));
        }

        Ok(payload)
    }
}
