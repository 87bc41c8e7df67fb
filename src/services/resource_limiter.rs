// src/services/resource_limiter.rs
use crate::cache::ResourceCache;
use crate::error::EngineError;
use crate::models::{ActionTrigger, CgrEvent, ResourceLimit};
use crate::services::FilterIndex;
use crate::traits::{ActionExecutor, ResourceLimitStore};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn, error, debug};

pub const START_LOAD_ID: &str = "ResourceLimiterServiceStart";

/// Result of admitting an event against its highest-priority resource limit
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    /// No active limit applies to the event
    Unconstrained,
    /// `slot` is the held usage timestamp; `None` for provisional (authorize-only) grants
    Granted { limit_id: String, slot: Option<i64> },
    Denied { limit_id: String },
}

impl AdmissionOutcome {
    /// Grant token carried in replies as `ResourceAllocation`
    pub fn allocation(&self) -> Option<&str> {
        match self {
            AdmissionOutcome::Granted { limit_id, .. } => Some(limit_id),
            _ => None,
        }
    }

    pub fn denied(&self) -> Option<&str> {
        match self {
            AdmissionOutcome::Denied { limit_id } => Some(limit_id),
            _ => None,
        }
    }

    pub fn slot(&self) -> Option<i64> {
        match self {
            AdmissionOutcome::Granted { slot, .. } => *slot,
            _ => None,
        }
    }
}

/// A slot reserved for a caller that has not committed it yet; dropping it releases the slot
pub struct PendingSlot<'a> {
    limiter: &'a ResourceLimiterService,
    held: Option<(String, i64)>,
}

impl<'a> PendingSlot<'a> {
    pub fn new(limiter: &'a ResourceLimiterService, outcome: &AdmissionOutcome) -> Self {
        let held = match outcome {
            AdmissionOutcome::Granted {
                limit_id,
                slot: Some(slot),
            } => Some((limit_id.clone(), *slot)),
            _ => None,
        };
        Self { limiter, held }
    }

    /// Keeps the slot held past this guard
    pub fn commit(mut self) -> Option<(String, i64)> {
        self.held.take()
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if let Some((limit_id, slot)) = self.held.take() {
            debug!("Uncommitted slot {} on {} returned", slot, limit_id);
            self.limiter.release(&limit_id, slot);
        }
    }
}

/// Admission engine over cached resource limits
pub struct ResourceLimiterService {
    cache: ResourceCache,
    index: FilterIndex,
    usage_ttl: Duration,
    executor: Option<Arc<dyn ActionExecutor>>,
}

impl ResourceLimiterService {
    pub fn new(
        store: Arc<dyn ResourceLimitStore>,
        usage_ttl: Duration,
        executor: Option<Arc<dyn ActionExecutor>>,
    ) -> Self {
        Self {
            cache: ResourceCache::new(store),
            index: FilterIndex::new(),
            usage_ttl,
            executor,
        }
    }

    /// Full cache and index load
    pub async fn start(&self) -> Result<(), EngineError> {
        info!("🚀 Starting resource limiter service");
        self.cache_resource_limits(START_LOAD_ID, None).await
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        info!("🛑 Resource limiter service stopped ({} limits cached)", self.cache.len());
        Ok(())
    }

    /// Refreshes definitions from the store, then rebuilds the index with the same scope
    pub async fn cache_resource_limits(
        &self,
        load_id: &str,
        ids: Option<&[String]>,
    ) -> Result<(), EngineError> {
        self.cache.refresh(load_id, ids).await?;
        self.index.rebuild(&self.cache, ids)
    }

    /// Active limits whose filters all match, by weight descending then ID
    pub fn candidates(&self, event: &CgrEvent, now: DateTime<Utc>) -> Vec<ResourceLimit> {
        let mut found: Vec<ResourceLimit> = self
            .index
            .shortlist(event)
            .iter()
            .filter_map(|id| self.cache.get(id))
            .filter_map(|shared| {
                let rl = shared.lock();
                (rl.is_active(now) && rl.matches(event)).then(|| rl.clone())
            })
            .collect();

        found.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        found
    }

    /// Provisional admission of the top candidate; usage is not touched
    pub fn authorize(&self, event: &CgrEvent, now: DateTime<Utc>) -> AdmissionOutcome {
        let Some(top) = self.candidates(event, now).into_iter().next() else {
            return AdmissionOutcome::Unconstrained;
        };

        let mut used = top.used.clone();
        used.prune(now, self.usage_ttl);

        if used.count() < top.limit as usize {
            debug!("Authorized on {} ({}/{})", top.id, used.count(), top.limit);
            AdmissionOutcome::Granted {
                limit_id: top.id,
                slot: None,
            }
        } else {
            info!("⛔ Resource {} exhausted ({}/{})", top.id, used.count(), top.limit);
            AdmissionOutcome::Denied { limit_id: top.id }
        }
    }

    /// Reserves a slot on the top candidate for the event
    pub fn allocate(
        &self,
        event: &CgrEvent,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, EngineError> {
        match self.candidates(event, now).into_iter().next() {
            Some(top) => self.reserve(&top.id, now),
            None => Ok(AdmissionOutcome::Unconstrained),
        }
    }

    /// Prunes expired usage, then appends `now` if there is room. A denial leaves usage as is.
    ///
    /// Never suspends: the slot is either held by the caller on return or not taken at all.
    pub fn reserve(&self, limit_id: &str, now: DateTime<Utc>) -> Result<AdmissionOutcome, EngineError> {
        let shared = self
            .cache
            .get(limit_id)
            .ok_or_else(|| EngineError::NotFound(format!("resource limit {}", limit_id)))?;

        let (slot, fired, usage) = {
            let mut rl = shared.lock();
            rl.used.prune(now, self.usage_ttl);

            if !rl.has_capacity() {
                info!("⛔ Resource {} exhausted ({}/{})", rl.id, rl.used.count(), rl.limit);
                return Ok(AdmissionOutcome::Denied {
                    limit_id: limit_id.to_string(),
                });
            }

            let slot = rl.used.append(now);
            info!("✅ Reserved {} ({}/{})", rl.id, rl.used.count(), rl.limit);
            (slot, rl.evaluate_triggers(), rl.used.count() as f64)
        };

        self.spawn_triggers(limit_id, fired, usage);
        Ok(AdmissionOutcome::Granted {
            limit_id: limit_id.to_string(),
            slot: Some(slot),
        })
    }

    /// Drops the slot held at `slot`; releasing twice is a no-op
    pub fn release(&self, limit_id: &str, slot: i64) {
        let Some(shared) = self.cache.get(limit_id) else {
            warn!("Release on uncached resource limit {}", limit_id);
            return;
        };

        let (fired, usage) = {
            let mut rl = shared.lock();
            if !rl.used.remove(slot) {
                debug!("Slot {} already released on {}", slot, limit_id);
                return;
            }
            info!("🔓 Released {} ({}/{})", rl.id, rl.used.count(), rl.limit);
            (rl.evaluate_triggers(), rl.used.count() as f64)
        };

        self.spawn_triggers(limit_id, fired, usage);
    }

    /// Whether `slot` is still held on `limit_id`, after pruning expired usage
    pub fn holds(&self, limit_id: &str, slot: i64, now: DateTime<Utc>) -> bool {
        self.cache.get(limit_id).map_or(false, |shared| {
            let mut rl = shared.lock();
            rl.used.prune(now, self.usage_ttl);
            rl.used.holds(slot)
        })
    }

    /// Usage is already committed, so actions run detached and their failures are only logged
    fn spawn_triggers(&self, limit_id: &str, fired: Vec<ActionTrigger>, usage: f64) {
        if fired.is_empty() {
            return;
        }
        let Some(executor) = self.executor.clone() else {
            warn!("{} triggers fired on {} with no action executor", fired.len(), limit_id);
            return;
        };

        let limit_id = limit_id.to_string();
        tokio::spawn(async move {
            for trigger in fired {
                info!(
                    "⚡ Trigger {} ({} {}) fired on {} at usage {}",
                    trigger.id, trigger.threshold_type, trigger.threshold_value, limit_id, usage
                );
                if let Err(e) = executor.execute(&limit_id, &trigger, usage).await {
                    error!("❌ Actions {} failed for {}: {}", trigger.actions_id, limit_id, e);
                }
            }
        });
    }

    /// Live slot count, pruned at `now`
    pub fn usage(&self, limit_id: &str, now: DateTime<Utc>) -> Option<usize> {
        self.cache.get(limit_id).map(|shared| {
            let mut rl = shared.lock();
            rl.used.prune(now, self.usage_ttl);
            rl.used.count()
        })
    }

    pub fn index(&self) -> &FilterIndex {
        &self.index
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }
}
