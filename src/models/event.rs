// src/models/event.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::EngineError;

/// Field names used inside `CgrEvent::event`
pub mod fields {
    pub const CGRID: &str = "CGRID";
    pub const TENANT: &str = "Tenant";
    pub const CATEGORY: &str = "Category";
    pub const TOR: &str = "ToR";
    pub const ORIGIN_ID: &str = "OriginID";
    pub const ORIGIN_HOST: &str = "OriginHost";
    pub const REQUEST_TYPE: &str = "RequestType";
    pub const ACCOUNT: &str = "Account";
    pub const SUBJECT: &str = "Subject";
    pub const DESTINATION: &str = "Destination";
    pub const SETUP_TIME: &str = "SetupTime";
    pub const ANSWER_TIME: &str = "AnswerTime";
    pub const USAGE: &str = "Usage";
}

/// Context stamped on events forwarded by the session layer
pub const SESSIONS_CONTEXT: &str = "*sessions";

/// Generic charging event: a tenant plus a loosely typed field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CgrEvent {
    #[serde(rename = "Tenant")]
    pub tenant: String,

    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(rename = "Event", default)]
    pub event: HashMap<String, Value>,
}

impl CgrEvent {
    pub fn new(tenant: &str, id: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            id: id.to_string(),
            context: None,
            event: HashMap::new(),
        }
    }

    /// Builder-style field setter, handy for tests and fixtures
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.event.insert(name.to_string(), value.into());
        self
    }

    /// Field value rendered as string; numbers and booleans are stringified
    pub fn field_as_string(&self, name: &str) -> Option<String> {
        match self.event.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string_or_empty(&self, name: &str) -> String {
        self.field_as_string(name).unwrap_or_default()
    }

    pub fn origin_id(&self) -> Result<String, EngineError> {
        self.field_as_string(fields::ORIGIN_ID)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::InvalidRequest(fields::ORIGIN_ID.to_string()))
    }

    pub fn field_as_time(&self, name: &str) -> Result<Option<DateTime<Utc>>, EngineError> {
        match self.event.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| EngineError::InvalidRequest(format!("{}: {}", name, e))),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(Some)
                .ok_or_else(|| EngineError::InvalidRequest(name.to_string())),
            Some(_) => Err(EngineError::InvalidRequest(name.to_string())),
        }
    }

    /// Durations travel either as integer nanoseconds or as strings like "5m", "1h30m", "300s"
    pub fn field_as_duration(&self, name: &str) -> Result<Option<Duration>, EngineError> {
        match self.event.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                let nanos = n
                    .as_f64()
                    .filter(|v| *v >= 0.0)
                    .ok_or_else(|| EngineError::InvalidRequest(name.to_string()))?;
                Ok(Some(Duration::from_nanos(nanos as u64)))
            }
            Some(Value::String(s)) => parse_duration(s)
                .map(Some)
                .ok_or_else(|| EngineError::InvalidRequest(format!("{}: {}", name, s))),
            Some(_) => Err(EngineError::InvalidRequest(name.to_string())),
        }
    }

    pub fn usage(&self) -> Result<Option<Duration>, EngineError> {
        self.field_as_duration(fields::USAGE)
    }

    /// Content-derived identifier correlating session, CDR and attribute records
    pub fn cgr_id(&self) -> String {
        let tenant = self
            .field_as_string(fields::TENANT)
            .unwrap_or_else(|| self.tenant.clone());

        let mut hasher = Sha1::new();
        for part in [
            tenant,
            self.string_or_empty(fields::CATEGORY),
            self.string_or_empty(fields::ACCOUNT),
            self.string_or_empty(fields::SUBJECT),
            self.string_or_empty(fields::DESTINATION),
            self.string_or_empty(fields::ORIGIN_ID),
        ] {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Serializes a duration the way event producers expect it: integer nanoseconds
pub fn duration_to_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(nanos) = input.parse::<u64>() {
        return Some(Duration::from_nanos(nanos));
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = input;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let multiplier = match &rest[..unit_len] {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "us" | "µs" => 1_000.0,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * multiplier;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}
