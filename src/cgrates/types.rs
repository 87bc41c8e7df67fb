//! Tipos de datos JSON-RPC compartidos por el cliente y el servidor
//!
//! Los argumentos de los colaboradores siguen la convención de CGRateS:
//! un `CGREvent` aplanado más los campos propios de cada método.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::CgrEvent;

// ============================================================================
// JSON-RPC Types
// ============================================================================

fn default_version() -> String {
    "2.0".to_string()
}

/// Request JSON-RPC; `params` lleva un único objeto
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest<T> {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default = "Vec::new")]
    pub params: Vec<T>,
    #[serde(default)]
    pub id: Value,
}

/// Response JSON-RPC
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

impl<T> JsonRpcResponse<T> {
    pub fn success(id: Value, result: T) -> Self {
        Self {
            jsonrpc: default_version(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Error JSON-RPC; `message` lleva el código textual (`NOT_FOUND`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

// ============================================================================
// RALs Types
// ============================================================================

/// Argumentos para RALsV1.GetMaxUsage y RALsV1.Debit
#[derive(Debug, Clone, Serialize)]
pub struct UsageArgs<'a> {
    #[serde(flatten)]
    pub cgr_event: &'a CgrEvent,

    /// Nanosegundos
    #[serde(rename = "Usage")]
    pub usage: i64,
}

/// Argumentos para RALsV1.GetCost
#[derive(Debug, Clone, Serialize)]
pub struct CostArgs<'a> {
    #[serde(flatten)]
    pub cgr_event: &'a CgrEvent,

    #[serde(rename = "RunID")]
    pub run_id: &'a str,
}

/// Respuesta de RALsV1.GetCost
#[derive(Debug, Clone, Deserialize)]
pub struct CostReply {
    #[serde(rename = "Cost")]
    pub cost: Decimal,

    #[serde(rename = "RunID", default)]
    pub run_id: Option<String>,
}

// ============================================================================
// ApierS Types
// ============================================================================

/// Argumentos para ApierV1.ExecuteAction disparado por un umbral de recurso
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteActionArgs<'a> {
    #[serde(rename = "Tenant")]
    pub tenant: &'a str,

    #[serde(rename = "ActionsId")]
    pub actions_id: &'a str,

    #[serde(rename = "ResourceLimitID")]
    pub resource_limit_id: &'a str,

    #[serde(rename = "ThresholdType")]
    pub threshold_type: &'a str,

    #[serde(rename = "ThresholdValue")]
    pub threshold_value: f64,

    #[serde(rename = "Usage")]
    pub usage: f64,
}
