// src/models/mod.rs
pub mod event;
pub mod resource;
pub mod session;
pub mod charging;
pub mod cdr;

pub use event::{fields, CgrEvent};
pub use resource::{filter_types, threshold_types, ActionTrigger, RequestFilter, ResourceLimit, UsageSlots};
pub use session::{ActiveSession, ActiveSessionsFilter, DisconnectSessionArgs, Session, SessionRun};
pub use charging::{AttrProcessEventReply, SortedSupplier, SortedSuppliers};
pub use cdr::{Cdr, CdrFilter, RAW_RUN_ID};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use event::duration_to_nanos;

pub const OK: &str = "OK";
pub const PONG: &str = "Pong";

// ==================== API DTOs ====================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizeArgs {
    #[serde(rename = "GetMaxUsage", default)]
    pub get_max_usage: bool,
    #[serde(rename = "AuthorizeResources", default)]
    pub authorize_resources: bool,
    #[serde(rename = "GetSuppliers", default)]
    pub get_suppliers: bool,
    #[serde(rename = "GetAttributes", default)]
    pub get_attributes: bool,
    /// Caller-supplied bound for collaborator calls
    #[serde(rename = "TimeoutMs", default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub cgr_event: CgrEvent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InitSessionArgs {
    #[serde(rename = "InitSession", default)]
    pub init_session: bool,
    #[serde(rename = "AllocateResources", default)]
    pub allocate_resources: bool,
    #[serde(rename = "GetAttributes", default)]
    pub get_attributes: bool,
    #[serde(rename = "TimeoutMs", default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub cgr_event: CgrEvent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateSessionArgs {
    #[serde(rename = "UpdateSession", default)]
    pub update_session: bool,
    #[serde(rename = "GetAttributes", default)]
    pub get_attributes: bool,
    #[serde(rename = "TimeoutMs", default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub cgr_event: CgrEvent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TerminateSessionArgs {
    #[serde(rename = "TerminateSession", default)]
    pub terminate_session: bool,
    #[serde(rename = "ReleaseResources", default)]
    pub release_resources: bool,
    #[serde(rename = "TimeoutMs", default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub cgr_event: CgrEvent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessEventArgs {
    #[serde(rename = "AllocateResources", default)]
    pub allocate_resources: bool,
    #[serde(rename = "Debit", default)]
    pub debit: bool,
    #[serde(rename = "GetAttributes", default)]
    pub get_attributes: bool,
    #[serde(rename = "TimeoutMs", default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub cgr_event: CgrEvent,
}

/// Arguments of ResourceLimiterSv1.CacheResourceLimits; `None` IDs means full reload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheResourceLimitsArgs {
    #[serde(rename = "LoadID", default)]
    pub load_id: String,
    #[serde(rename = "ResourceLimitIDs", default)]
    pub resource_limit_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuthorizeReply {
    /// Nanoseconds
    #[serde(rename = "MaxUsage", skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<i64>,
    #[serde(rename = "ResourceAllocation", skip_serializing_if = "Option::is_none")]
    pub resource_allocation: Option<String>,
    /// Set when the matching limit is exhausted
    #[serde(rename = "ResourceDenied", skip_serializing_if = "Option::is_none")]
    pub resource_denied: Option<String>,
    #[serde(rename = "Suppliers", skip_serializing_if = "Option::is_none")]
    pub suppliers: Option<SortedSuppliers>,
    #[serde(rename = "Attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrProcessEventReply>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuthorizeReplyWithDigest {
    /// Seconds
    #[serde(rename = "MaxUsage", skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<f64>,
    #[serde(rename = "ResourceAllocation", skip_serializing_if = "Option::is_none")]
    pub resource_allocation: Option<String>,
    #[serde(rename = "ResourceDenied", skip_serializing_if = "Option::is_none")]
    pub resource_denied: Option<String>,
    #[serde(rename = "SuppliersDigest", skip_serializing_if = "Option::is_none")]
    pub suppliers_digest: Option<String>,
    #[serde(rename = "AttributesDigest", skip_serializing_if = "Option::is_none")]
    pub attributes_digest: Option<String>,
}

impl From<AuthorizeReply> for AuthorizeReplyWithDigest {
    fn from(reply: AuthorizeReply) -> Self {
        Self {
            max_usage: reply.max_usage.map(nanos_to_seconds),
            resource_allocation: reply.resource_allocation,
            resource_denied: reply.resource_denied,
            suppliers_digest: reply.suppliers.map(|s| s.digest()),
            attributes_digest: reply.attributes.map(|a| a.digest()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InitSessionReply {
    #[serde(rename = "MaxUsage", skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<i64>,
    #[serde(rename = "ResourceAllocation", skip_serializing_if = "Option::is_none")]
    pub resource_allocation: Option<String>,
    #[serde(rename = "ResourceDenied", skip_serializing_if = "Option::is_none")]
    pub resource_denied: Option<String>,
    #[serde(rename = "Attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrProcessEventReply>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InitSessionReplyWithDigest {
    #[serde(rename = "MaxUsage", skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<f64>,
    #[serde(rename = "ResourceAllocation", skip_serializing_if = "Option::is_none")]
    pub resource_allocation: Option<String>,
    #[serde(rename = "ResourceDenied", skip_serializing_if = "Option::is_none")]
    pub resource_denied: Option<String>,
    #[serde(rename = "AttributesDigest", skip_serializing_if = "Option::is_none")]
    pub attributes_digest: Option<String>,
}

impl From<InitSessionReply> for InitSessionReplyWithDigest {
    fn from(reply: InitSessionReply) -> Self {
        Self {
            max_usage: reply.max_usage.map(nanos_to_seconds),
            resource_allocation: reply.resource_allocation,
            resource_denied: reply.resource_denied,
            attributes_digest: reply.attributes.map(|a| a.digest()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdateSessionReply {
    #[serde(rename = "MaxUsage", skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<i64>,
    #[serde(rename = "Attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrProcessEventReply>,
}

pub type ProcessEventReply = InitSessionReply;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

pub fn max_usage_nanos(d: Duration) -> Option<i64> {
    Some(duration_to_nanos(d))
}

fn nanos_to_seconds(ns: i64) -> f64 {
    ns as f64 / 1_000_000_000.0
}
