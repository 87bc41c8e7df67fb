// src/models/cdr.rs
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Run ID of the unrated pass over an event
pub const RAW_RUN_ID: &str = "*raw";

/// Billing record for one run over a finalized event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cdr {
    #[serde(rename = "ID")]
    pub id: Uuid,

    #[serde(rename = "CGRID")]
    pub cgr_id: String,

    #[serde(rename = "RunID")]
    pub run_id: String,

    #[serde(rename = "OriginHost")]
    pub origin_host: String,

    #[serde(rename = "OriginID")]
    pub origin_id: String,

    #[serde(rename = "Tenant")]
    pub tenant: String,

    #[serde(rename = "Category")]
    pub category: String,

    #[serde(rename = "RequestType")]
    pub request_type: String,

    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "Subject")]
    pub subject: String,

    #[serde(rename = "Destination")]
    pub destination: String,

    #[serde(rename = "SetupTime")]
    pub setup_time: Option<DateTime<Utc>>,

    #[serde(rename = "AnswerTime")]
    pub answer_time: Option<DateTime<Utc>>,

    /// Nanoseconds
    #[serde(rename = "Usage")]
    pub usage: i64,

    /// `-1` for unrated runs
    #[serde(rename = "Cost")]
    pub cost: Decimal,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

impl Cdr {
    pub fn is_rated(&self) -> bool {
        self.cost >= Decimal::ZERO
    }
}

/// Exact-match query over stored CDRs; an empty set does not constrain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdrFilter {
    #[serde(rename = "RunIDs", default)]
    pub run_ids: Vec<String>,

    #[serde(rename = "OriginIDs", default)]
    pub origin_ids: Vec<String>,
}

impl CdrFilter {
    pub fn matches(&self, cdr: &Cdr) -> bool {
        (self.run_ids.is_empty() || self.run_ids.contains(&cdr.run_id))
            && (self.origin_ids.is_empty() || self.origin_ids.contains(&cdr.origin_id))
    }
}
