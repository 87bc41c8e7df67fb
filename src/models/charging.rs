// src/models/charging.rs
//! Replies produced by the attribute and supplier services

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::event::CgrEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedSupplier {
    #[serde(rename = "SupplierID")]
    pub supplier_id: String,

    #[serde(rename = "SortingData", default)]
    pub sorting_data: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedSuppliers {
    #[serde(rename = "ProfileID")]
    pub profile_id: String,

    #[serde(rename = "Sorting")]
    pub sorting: String,

    #[serde(rename = "SortedSuppliers", default)]
    pub sorted_suppliers: Vec<SortedSupplier>,
}

impl SortedSuppliers {
    /// "supplier1,supplier2"
    pub fn digest(&self) -> String {
        self.sorted_suppliers
            .iter()
            .map(|s| s.supplier_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrProcessEventReply {
    #[serde(rename = "MatchedProfiles", default)]
    pub matched_profiles: Vec<String>,

    #[serde(rename = "AlteredFields", default)]
    pub altered_fields: Vec<String>,

    #[serde(rename = "CGREvent")]
    pub cgr_event: CgrEvent,
}

impl AttrProcessEventReply {
    /// "OfficeGroup:Marketing", one `field:value` pair per altered field
    pub fn digest(&self) -> String {
        self.altered_fields
            .iter()
            .map(|field| {
                format!(
                    "{}:{}",
                    field,
                    self.cgr_event.field_as_string(field).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
