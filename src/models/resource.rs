// src/models/resource.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};

use super::event::CgrEvent;

/// Filter types understood by the limiter
pub mod filter_types {
    /// Exact string match, the only type that gets indexed
    pub const STRING: &str = "*string";
    pub const PREFIX: &str = "*string_prefix";
}

/// Threshold kinds for action triggers
pub mod threshold_types {
    pub const MAX_USAGE: &str = "*max_usage";
    pub const MIN_USAGE: &str = "*min_usage";
}

/// Predicate against one event field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFilter {
    #[serde(rename = "Type")]
    pub filter_type: String,

    #[serde(rename = "FieldName")]
    pub field_name: String,

    #[serde(rename = "Values", default)]
    pub values: Vec<String>,
}

impl RequestFilter {
    pub fn exact(field_name: &str, values: &[&str]) -> Self {
        Self {
            filter_type: filter_types::STRING.to_string(),
            field_name: field_name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn is_exact_match(&self) -> bool {
        self.filter_type == filter_types::STRING
    }

    /// Non-exact filter types are opaque here and always pass
    pub fn passes(&self, event: &CgrEvent) -> bool {
        if !self.is_exact_match() {
            return true;
        }
        match event.field_as_string(&self.field_name) {
            Some(value) => self.values.iter().any(|v| *v == value),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTrigger {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "ThresholdType")]
    pub threshold_type: String,

    #[serde(rename = "ThresholdValue")]
    pub threshold_value: f64,

    #[serde(rename = "ActionsID")]
    pub actions_id: String,

    #[serde(rename = "Executed", default)]
    pub executed: bool,
}

impl ActionTrigger {
    pub fn is_crossed(&self, usage: f64) -> bool {
        match self.threshold_type.as_str() {
            threshold_types::MAX_USAGE => usage >= self.threshold_value,
            threshold_types::MIN_USAGE => usage <= self.threshold_value,
            _ => false,
        }
    }
}

/// Reservation instants (unix milliseconds), one per held slot.
///
/// Expiry is implicit: anything older than the usage horizon is pruned before counting.
/// Each held value is unique, so a slot doubles as the release token of its holder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageSlots(Vec<i64>);

impl UsageSlots {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn prune(&mut self, now: DateTime<Utc>, horizon: Duration) {
        let cutoff = (now - horizon).timestamp_millis();
        self.0.retain(|ts| *ts > cutoff);
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Appends a slot at `at`, bumped forward past any slot already held at that instant
    pub fn append(&mut self, at: DateTime<Utc>) -> i64 {
        let mut ts = at.timestamp_millis();
        while self.0.contains(&ts) {
            ts += 1;
        }
        self.0.push(ts);
        ts
    }

    pub fn holds(&self, ts: i64) -> bool {
        self.0.contains(&ts)
    }

    /// Removes one slot with the given timestamp; `false` if none was held
    pub fn remove(&mut self, ts: i64) -> bool {
        match self.0.iter().position(|held| *held == ts) {
            Some(pos) => {
                self.0.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.0
    }
}

/// A limit imposed on accessing a resource (eg: new calls)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimit {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Filters", default)]
    pub filters: Vec<RequestFilter>,

    #[serde(rename = "ActivationTime")]
    pub activation_time: DateTime<Utc>,

    #[serde(rename = "Weight", default)]
    pub weight: f64,

    #[serde(rename = "Limit")]
    pub limit: u32,

    #[serde(rename = "ActionTriggers", default)]
    pub action_triggers: Vec<ActionTrigger>,

    #[serde(rename = "Used", default)]
    pub used: UsageSlots,
}

impl ResourceLimit {
    pub fn matches(&self, event: &CgrEvent) -> bool {
        self.filters.iter().all(|f| f.passes(event))
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.activation_time <= now
    }

    pub fn has_capacity(&self) -> bool {
        self.used.count() < self.limit as usize
    }

    /// Re-arms triggers whose condition no longer holds and returns the ones that just fired
    pub fn evaluate_triggers(&mut self) -> Vec<ActionTrigger> {
        let usage = self.used.count() as f64;
        let mut fired = Vec::new();
        for trigger in self.action_triggers.iter_mut() {
            let crossed = trigger.is_crossed(usage);
            if crossed && !trigger.executed {
                trigger.executed = true;
                fired.push(trigger.clone());
            } else if !crossed && trigger.executed {
                trigger.executed = false;
            }
        }
        fired
    }
}
