// src/services/mod.rs
pub mod filter_index;
pub mod resource_limiter;
pub mod session_table;
pub mod session_manager;
pub mod cdr_generator;

pub use filter_index::FilterIndex;
pub use resource_limiter::{AdmissionOutcome, PendingSlot, ResourceLimiterService};
pub use session_table::{Allocation, SessionTable};
pub use session_manager::{SessionManager, SessionManagerConfig};
pub use cdr_generator::CdrGenerator;

use crate::error::EngineError;
use std::future::Future;
use std::time::Duration;

/// Bounds a collaborator call; elapsed time maps to `EngineError::Timeout`
pub(crate) async fn bounded<T, F>(what: &str, timeout: Duration, call: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(format!("{} after {:?}", what, timeout))),
    }
}
