// src/cache/memory_store.rs
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::ResourceLimit;
use crate::traits::ResourceLimitStore;

/// Process-local definition store, used when no Redis is configured and in tests
#[derive(Default)]
pub struct MemoryResourceStore {
    limits: RwLock<HashMap<String, ResourceLimit>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: impl IntoIterator<Item = ResourceLimit>) -> Self {
        let store = Self::new();
        {
            let mut map = store.limits.write();
            for rl in limits {
                map.insert(rl.id.clone(), rl);
            }
        }
        store
    }
}

#[async_trait]
impl ResourceLimitStore for MemoryResourceStore {
    async fn get_all(&self) -> Result<Vec<ResourceLimit>, EngineError> {
        Ok(self.limits.read().values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ResourceLimit>, EngineError> {
        Ok(self.limits.read().get(id).cloned())
    }

    async fn set(&self, limit: &ResourceLimit) -> Result<(), EngineError> {
        self.limits.write().insert(limit.id.clone(), limit.clone());
        Ok(())
    }
}
