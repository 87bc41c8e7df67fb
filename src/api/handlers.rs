// src/api/handlers.rs
use actix_web::{web, HttpResponse};
use serde_json::Value;
use std::sync::Arc;

use crate::api::registry::MethodRegistry;
use crate::cgrates::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::error::EngineError;
use crate::models::HealthResponse;

// JSON-RPC 2.0 reserved codes
const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const SERVER_ERROR: i32 = -32000;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "apolo-session-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Single JSON-RPC endpoint; every outcome, errors included, is an HTTP 200 envelope
pub async fn jsonrpc(
    body: web::Bytes,
    registry: web::Data<Arc<MethodRegistry>>,
) -> HttpResponse {
    let request: JsonRpcRequest<Value> = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Malformed JSON-RPC request: {}", e);
            return HttpResponse::Ok().json(JsonRpcResponse::<Value>::failure(
                Value::Null,
                JsonRpcError {
                    code: PARSE_ERROR,
                    message: format!("{}: {}", EngineError::InvalidRequest(String::new()).rpc_code(), e),
                },
            ));
        }
    };

    let JsonRpcRequest { method, params, id, .. } = request;
    let params = params.into_iter().next().unwrap_or(Value::Null);

    match registry.dispatch(&method, params).await {
        Ok(result) => HttpResponse::Ok().json(JsonRpcResponse::success(id, result)),
        Err(e) => {
            if matches!(e, EngineError::NotFound(_)) {
                tracing::debug!("{}: {}", method, e);
            } else {
                tracing::error!("{} error: {}", method, e);
            }
            HttpResponse::Ok().json(JsonRpcResponse::<Value>::failure(id, rpc_error(&e)))
        }
    }
}

/// Plain code for lookups and dispatch misses, code plus detail otherwise
pub fn rpc_error(e: &EngineError) -> JsonRpcError {
    let code = match e {
        EngineError::NotImplemented(_) => METHOD_NOT_FOUND,
        EngineError::InvalidRequest(_) => INVALID_PARAMS,
        _ => SERVER_ERROR,
    };
    let message = match e {
        EngineError::NotFound(_) | EngineError::NotImplemented(_) => e.rpc_code().to_string(),
        _ => format!("{}: {}", e.rpc_code(), e),
    };
    JsonRpcError { code, message }
}
