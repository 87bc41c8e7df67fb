//! Canal de avisos hacia el agente de conmutación

use async_trait::async_trait;
use tracing::{info, instrument};

use super::client::RpcClient;
use crate::error::EngineError;
use crate::models::DisconnectSessionArgs;
use crate::traits::SessionNotifier;

#[async_trait]
impl SessionNotifier for RpcClient {
    #[instrument(skip(self, args), fields(event_id = %args.event_start.id))]
    async fn disconnect_session(&self, args: &DisconnectSessionArgs) -> Result<String, EngineError> {
        let reply: String = self.call("SessionSv1.DisconnectSession", args).await?;
        info!(
            "📴 DisconnectSession sent to {} ({}): {}",
            self.base_url(),
            args.reason,
            reply
        );
        Ok(reply)
    }
}
