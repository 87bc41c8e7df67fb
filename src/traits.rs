//! Collaborator seams of the session engine
//!
//! Everything behind these traits (storage, rating, attribute matching,
//! supplier sorting, action execution, agent notifications) lives outside the core.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::error::EngineError;
use crate::models::{
    ActionTrigger, AttrProcessEventReply, Cdr, CdrFilter, CgrEvent, DisconnectSessionArgs,
    ResourceLimit, SortedSuppliers,
};

/// Persistent store of resource limit definitions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceLimitStore: Send + Sync {
    /// All definitions under the resource limit namespace
    async fn get_all(&self) -> Result<Vec<ResourceLimit>, EngineError>;

    /// Single definition by ID
    async fn get(&self, id: &str) -> Result<Option<ResourceLimit>, EngineError>;

    async fn set(&self, limit: &ResourceLimit) -> Result<(), EngineError>;
}

/// Persistent store of billing records
#[async_trait]
pub trait CdrStore: Send + Sync {
    async fn store(&self, cdr: &Cdr) -> Result<(), EngineError>;

    async fn get_cdrs(&self, filter: &CdrFilter) -> Result<Vec<Cdr>, EngineError>;

    async fn count_cdrs(&self, filter: &CdrFilter) -> Result<i64, EngineError>;
}

/// Rating engine: usage grants, debits and cost computation
#[async_trait]
pub trait RatingService: Send + Sync {
    /// Largest usage (up to `requested`) the event's account can currently afford
    async fn max_usage(&self, event: &CgrEvent, requested: Duration) -> Result<Duration, EngineError>;

    /// Debits `usage` and returns what was actually debited
    async fn debit(&self, event: &CgrEvent, usage: Duration) -> Result<Duration, EngineError>;

    /// Cost of the finalized event for one charge run
    async fn cost(&self, event: &CgrEvent, run_id: &str) -> Result<Decimal, EngineError>;
}

#[async_trait]
pub trait AttributeService: Send + Sync {
    async fn process_event(&self, event: &CgrEvent) -> Result<AttrProcessEventReply, EngineError>;
}

#[async_trait]
pub trait SupplierService: Send + Sync {
    async fn sorted_suppliers(&self, event: &CgrEvent) -> Result<SortedSuppliers, EngineError>;
}

/// Executes the action set behind a crossed resource threshold
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        limit_id: &str,
        trigger: &ActionTrigger,
        usage: f64,
    ) -> Result<(), EngineError>;
}

/// Server-to-client push channel towards the switching agent
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    /// Returns the agent acknowledgement (`"OK"`)
    async fn disconnect_session(&self, args: &DisconnectSessionArgs) -> Result<String, EngineError>;
}
