//! Cliente HTTP JSON-RPC hacia los servicios colaboradores
//!
//! Proporciona comunicación de bajo nivel con RALs, AttributeS, SupplierS,
//! ApierS y con el agente de conmutación (canal de avisos DisconnectSession).

use reqwest::{Client, ClientBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::error::rpc_codes;

/// Cliente JSON-RPC con numeración propia de requests
pub struct RpcClient {
    http_client: Client,
    base_url: String,
    tenant: String,
    origin_host: String,
    timeout_ms: u64,
    request_id: AtomicU64,
}

/// Errores del cliente JSON-RPC
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),
}

impl RpcClient {
    /// Crea un nuevo cliente
    ///
    /// # Arguments
    ///
    /// * `base_url` - URL del endpoint JSON-RPC (ej: "http://127.0.0.1:2080/jsonrpc")
    /// * `tenant` - Tenant por defecto (ej: "cgrates.org")
    /// * `timeout_ms` - Timeout para requests en milisegundos
    pub fn new(base_url: &str, tenant: &str, timeout_ms: u64) -> Result<Self, RpcClientError> {
        let http_client = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| RpcClientError::Connection(e.to_string()))?;

        let origin_host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "apolo-session-engine".to_string());

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            tenant: tenant.to_string(),
            origin_host,
            timeout_ms,
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn origin_host(&self) -> &str {
        &self.origin_host
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ejecuta una llamada JSON-RPC
    ///
    /// # Arguments
    ///
    /// * `method` - Método JSON-RPC (ej: "AttributeSv1.ProcessEvent")
    /// * `params` - Parámetros del método
    #[instrument(skip(self, params), fields(method = %method))]
    pub async fn call<T, R>(&self, method: &str, params: T) -> Result<R, RpcClientError>
    where
        T: Serialize + std::fmt::Debug,
        R: DeserializeOwned,
    {
        let request_id = self.next_id();

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: vec![params],
            id: json!(request_id),
        };

        debug!("RPC request: method={}, id={}", method, request_id);

        let response = self
            .http_client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcClientError::Timeout(self.timeout_ms)
                } else {
                    RpcClientError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("RPC HTTP error: method={}, status={}", method, status);
            return Err(RpcClientError::HttpError(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            RpcClientError::ParseError(format!("Failed to read response body: {}", e))
        })?;

        debug!("RPC response: {}", body);

        let rpc_response: JsonRpcResponse<R> = serde_json::from_str(&body).map_err(|e| {
            RpcClientError::ParseError(format!("Failed to parse JSON: {} - Body: {}", e, body))
        })?;

        if let Some(err) = rpc_response.error {
            if err.message.to_uppercase().contains(rpc_codes::NOT_FOUND) {
                return Err(RpcClientError::NotFound(err.message));
            }
            return Err(RpcClientError::RpcError(err.code, err.message));
        }

        rpc_response
            .result
            .ok_or_else(|| RpcClientError::EmptyResponse(method.to_string()))
    }
}
