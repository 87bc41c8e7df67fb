// src/models/session.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::event::{duration_to_nanos, CgrEvent};

/// Run context of a tracked session entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionRun {
    #[serde(rename = "*default")]
    Primary,
    #[serde(rename = "*digest")]
    Digest,
}

impl SessionRun {
    pub const ALL: [SessionRun; 2] = [SessionRun::Primary, SessionRun::Digest];

    pub fn as_str(&self) -> &str {
        match self {
            SessionRun::Primary => "*default",
            SessionRun::Digest => "*digest",
        }
    }
}

/// Live call context held by the session table
#[derive(Debug, Clone)]
pub struct Session {
    pub origin_id: String,
    pub cgr_id: String,
    pub tenant: String,
    pub run: SessionRun,
    pub event: CgrEvent,
    pub resource_allocation: Option<String>,
    /// Slot timestamp held on `resource_allocation`, needed to release it
    pub reservation_ts: Option<i64>,
    pub max_usage: Duration,
    pub total_usage: Duration,
    pub setup_time: Option<DateTime<Utc>>,
    pub answer_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Session {
    pub fn summary(&self) -> ActiveSession {
        ActiveSession {
            cgr_id: self.cgr_id.clone(),
            tenant: self.tenant.clone(),
            origin_id: self.origin_id.clone(),
            run_id: self.run.as_str().to_string(),
            account: self.event.string_or_empty(super::event::fields::ACCOUNT),
            destination: self.event.string_or_empty(super::event::fields::DESTINATION),
            resource_allocation: self.resource_allocation.clone(),
            max_usage: duration_to_nanos(self.max_usage),
            usage: duration_to_nanos(self.total_usage),
            setup_time: self.setup_time,
            answer_time: self.answer_time,
            last_update: self.last_update,
        }
    }
}

/// Read-only projection of a session returned by GetActiveSessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    #[serde(rename = "CGRID")]
    pub cgr_id: String,

    #[serde(rename = "Tenant")]
    pub tenant: String,

    #[serde(rename = "OriginID")]
    pub origin_id: String,

    #[serde(rename = "RunID")]
    pub run_id: String,

    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "Destination")]
    pub destination: String,

    #[serde(rename = "ResourceAllocation", skip_serializing_if = "Option::is_none")]
    pub resource_allocation: Option<String>,

    /// Nanoseconds
    #[serde(rename = "MaxUsage")]
    pub max_usage: i64,

    /// Nanoseconds
    #[serde(rename = "Usage")]
    pub usage: i64,

    #[serde(rename = "SetupTime", skip_serializing_if = "Option::is_none")]
    pub setup_time: Option<DateTime<Utc>>,

    #[serde(rename = "AnswerTime", skip_serializing_if = "Option::is_none")]
    pub answer_time: Option<DateTime<Utc>>,

    #[serde(rename = "LastUpdate")]
    pub last_update: DateTime<Utc>,
}

/// Optional scope for GetActiveSessions; empty matches everything
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActiveSessionsFilter {
    #[serde(rename = "Tenant", default)]
    pub tenant: Option<String>,

    #[serde(rename = "OriginID", default)]
    pub origin_id: Option<String>,
}

impl ActiveSessionsFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.tenant.as_ref().map_or(true, |t| *t == session.tenant)
            && self.origin_id.as_ref().map_or(true, |o| *o == session.origin_id)
    }
}

/// Server-to-client push asking the agent to hang up a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectSessionArgs {
    #[serde(rename = "EventStart")]
    pub event_start: CgrEvent,

    #[serde(rename = "Reason")]
    pub reason: String,
}
