//! RALs: tiempos máximos, débitos y costo por corrida de cargo

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, instrument};

use super::client::RpcClient;
use super::types::{CostArgs, CostReply, UsageArgs};
use crate::error::EngineError;
use crate::models::event::duration_to_nanos;
use crate::models::CgrEvent;
use crate::traits::RatingService;

fn nanos_to_duration(nanos: i64) -> Duration {
    Duration::from_nanos(nanos.max(0) as u64)
}

#[async_trait]
impl RatingService for RpcClient {
    /// RALsV1.GetMaxUsage; la respuesta viene en nanosegundos
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn max_usage(&self, event: &CgrEvent, requested: Duration) -> Result<Duration, EngineError> {
        let args = UsageArgs {
            cgr_event: event,
            usage: duration_to_nanos(requested),
        };

        let granted: i64 = self.call("RALsV1.GetMaxUsage", args).await?;
        let granted = nanos_to_duration(granted).min(requested);

        debug!("Max usage granted: {:?} of {:?}", granted, requested);
        Ok(granted)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn debit(&self, event: &CgrEvent, usage: Duration) -> Result<Duration, EngineError> {
        let args = UsageArgs {
            cgr_event: event,
            usage: duration_to_nanos(usage),
        };

        let debited: i64 = self.call("RALsV1.Debit", args).await?;
        Ok(nanos_to_duration(debited))
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn cost(&self, event: &CgrEvent, run_id: &str) -> Result<Decimal, EngineError> {
        let args = CostArgs {
            cgr_event: event,
            run_id,
        };

        let reply: CostReply = self.call("RALsV1.GetCost", args).await?;
        debug!("Cost for run {}: {}", run_id, reply.cost);
        Ok(reply.cost)
    }
}
