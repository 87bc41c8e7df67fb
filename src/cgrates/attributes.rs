//! AttributeS y SupplierS: enriquecimiento del evento y ordenamiento de proveedores

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::client::RpcClient;
use crate::error::EngineError;
use crate::models::{AttrProcessEventReply, CgrEvent, SortedSuppliers};
use crate::traits::{AttributeService, SupplierService};

#[async_trait]
impl AttributeService for RpcClient {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn process_event(&self, event: &CgrEvent) -> Result<AttrProcessEventReply, EngineError> {
        let reply: AttrProcessEventReply = self.call("AttributeSv1.ProcessEvent", event).await?;
        debug!(
            "Attributes matched {:?}, altered {:?}",
            reply.matched_profiles, reply.altered_fields
        );
        Ok(reply)
    }
}

#[async_trait]
impl SupplierService for RpcClient {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn sorted_suppliers(&self, event: &CgrEvent) -> Result<SortedSuppliers, EngineError> {
        let reply: SortedSuppliers = self.call("SupplierSv1.GetSuppliers", event).await?;
        debug!("Suppliers for {}: {}", event.id, reply.digest());
        Ok(reply)
    }
}
