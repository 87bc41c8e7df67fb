// src/cache/resource_cache.rs
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, debug};

use crate::error::EngineError;
use crate::models::ResourceLimit;
use crate::traits::ResourceLimitStore;

/// A cached definition; its mutex is the usage lock for that limit
pub type SharedLimit = Arc<Mutex<ResourceLimit>>;

/// In-memory staging of resource limit definitions loaded from the store
pub struct ResourceCache {
    store: Arc<dyn ResourceLimitStore>,
    limits: RwLock<HashMap<String, SharedLimit>>,
}

impl ResourceCache {
    pub fn new(store: Arc<dyn ResourceLimitStore>) -> Self {
        Self {
            store,
            limits: RwLock::new(HashMap::new()),
        }
    }

    /// Loads definitions from the store.
    ///
    /// `None` reloads everything, an empty list is a no-op, otherwise only the listed IDs
    /// are fetched. The cache is only touched once every fetch succeeded.
    pub async fn refresh(&self, load_id: &str, ids: Option<&[String]>) -> Result<(), EngineError> {
        let definitions = match ids {
            Some([]) => return Ok(()),
            None => {
                info!("📥 Caching all resource limits (load {})", load_id);
                self.store.get_all().await?
            }
            Some(ids) => {
                info!("📥 Caching resource limits {:?} (load {})", ids, load_id);
                let mut definitions = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.store.get(id).await? {
                        Some(rl) => definitions.push(rl),
                        None => {
                            return Err(EngineError::NotFound(format!("resource limit {}", id)))
                        }
                    }
                }
                definitions
            }
        };

        let count = definitions.len();
        self.install(definitions, ids.is_none());
        info!("✅ Done caching {} resource limits", count);
        Ok(())
    }

    /// Runtime usage and fired trigger state of already cached limits survive a reload
    fn install(&self, definitions: Vec<ResourceLimit>, full: bool) {
        let mut limits = self.limits.write();
        let mut loaded = HashSet::with_capacity(definitions.len());

        for mut definition in definitions {
            loaded.insert(definition.id.clone());
            match limits.get(&definition.id) {
                Some(cached) => {
                    let mut cached = cached.lock();
                    definition.used = std::mem::take(&mut cached.used);
                    for trigger in definition.action_triggers.iter_mut() {
                        if let Some(previous) =
                            cached.action_triggers.iter().find(|t| t.id == trigger.id)
                        {
                            trigger.executed = previous.executed;
                        }
                    }
                    *cached = definition;
                }
                None => {
                    limits.insert(definition.id.clone(), Arc::new(Mutex::new(definition)));
                }
            }
        }

        if full {
            limits.retain(|id, _| {
                let keep = loaded.contains(id);
                if !keep {
                    debug!("Dropping resource limit {} no longer in store", id);
                }
                keep
            });
        }
    }

    pub fn get(&self, id: &str) -> Option<SharedLimit> {
        self.limits.read().get(id).cloned()
    }

    /// Point-in-time copy of one definition
    pub fn snapshot(&self, id: &str) -> Option<ResourceLimit> {
        self.get(id).map(|rl| rl.lock().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.limits.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.limits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
