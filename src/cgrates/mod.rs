//! Integración JSON-RPC
//!
//! Este módulo proporciona el cliente hacia los servicios colaboradores:
//! - RALs: tiempo máximo autorizado, débitos y costos
//! - AttributeS / SupplierS: atributos y proveedores ordenados
//! - ApierS: acciones de umbrales de recursos
//! - Agente: avisos `SessionSv1.DisconnectSession`
//!
//! Los tipos JSON-RPC también los usa el servidor propio (`api::handlers`).
//!
//! # Uso
//!
//! ```rust,ignore
//! use crate::cgrates::RpcClient;
//! use crate::traits::SupplierService;
//!
//! let client = RpcClient::new("http://127.0.0.1:2080/jsonrpc", "cgrates.org", 500)?;
//! let suppliers = client.sorted_suppliers(&event).await?;
//! ```

mod client;
mod types;
mod ratings;
mod attributes;
mod actions;
mod agent;

pub use client::{RpcClient, RpcClientError};
pub use types::*;
