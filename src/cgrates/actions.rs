//! ApierS: ejecución de acciones asociadas a umbrales de recursos

use async_trait::async_trait;
use tracing::{info, instrument};

use super::client::RpcClient;
use super::types::ExecuteActionArgs;
use crate::error::EngineError;
use crate::models::{ActionTrigger, OK};
use crate::traits::ActionExecutor;

#[async_trait]
impl ActionExecutor for RpcClient {
    #[instrument(skip(self, trigger), fields(actions_id = %trigger.actions_id))]
    async fn execute(
        &self,
        limit_id: &str,
        trigger: &ActionTrigger,
        usage: f64,
    ) -> Result<(), EngineError> {
        let args = ExecuteActionArgs {
            tenant: self.tenant(),
            actions_id: &trigger.actions_id,
            resource_limit_id: limit_id,
            threshold_type: &trigger.threshold_type,
            threshold_value: trigger.threshold_value,
            usage,
        };

        let reply: String = self.call("ApierV1.ExecuteAction", args).await?;
        if reply != OK {
            return Err(EngineError::Internal(format!(
                "unexpected reply to ExecuteAction: {}",
                reply
            )));
        }

        info!("⚡ Actions {} executed for {}", trigger.actions_id, limit_id);
        Ok(())
    }
}
