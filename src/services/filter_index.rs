// src/services/filter_index.rs
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::cache::ResourceCache;
use crate::error::EngineError;
use crate::models::{CgrEvent, ResourceLimit};

/// field name -> field value -> resource limit IDs
pub type IndexMap = HashMap<String, HashMap<String, HashSet<String>>>;

/// Inverted index over the exact-match filters of cached resource limits
#[derive(Default)]
pub struct FilterIndex {
    index: RwLock<IndexMap>,
}

impl FilterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds from the cache.
    ///
    /// `None` replaces the live index. A list of IDs is merged additively, so buckets of
    /// values a definition no longer filters on stay until the next full rebuild.
    pub fn rebuild(&self, cache: &ResourceCache, ids: Option<&[String]>) -> Result<(), EngineError> {
        let scope = match ids {
            Some(ids) => ids.to_vec(),
            None => cache.ids(),
        };

        // Scan outside the index lock
        let mut fresh = IndexMap::new();
        for id in &scope {
            let definition = cache
                .snapshot(id)
                .ok_or_else(|| EngineError::NotFound(format!("resource limit {} not cached", id)))?;
            register(&mut fresh, &definition);
        }

        let mut index = self.index.write();
        match ids {
            None => {
                *index = fresh;
                info!("🔎 Filter index rebuilt: {} fields from {} limits", index.len(), scope.len());
            }
            Some(_) => {
                for (field, values) in fresh {
                    let buckets = index.entry(field).or_default();
                    for (value, limit_ids) in values {
                        buckets.entry(value).or_default().extend(limit_ids);
                    }
                }
                debug!("Filter index merged {} limits", scope.len());
            }
        }

        Ok(())
    }

    /// IDs registered under any (field, value) the event carries; filters still need verifying
    pub fn shortlist(&self, event: &CgrEvent) -> HashSet<String> {
        let index = self.index.read();
        let mut found = HashSet::new();

        for (field, values) in index.iter() {
            let Some(value) = event.field_as_string(field) else {
                continue;
            };
            if let Some(limit_ids) = values.get(&value) {
                found.extend(limit_ids.iter().cloned());
            }
        }

        found
    }

    /// Copy of the live index
    pub fn entries(&self) -> IndexMap {
        self.index.read().clone()
    }

    pub fn contains(&self, field: &str, value: &str, limit_id: &str) -> bool {
        self.index
            .read()
            .get(field)
            .and_then(|values| values.get(value))
            .map_or(false, |ids| ids.contains(limit_id))
    }
}

fn register(index: &mut IndexMap, definition: &ResourceLimit) {
    for filter in definition.filters.iter().filter(|f| f.is_exact_match()) {
        let buckets = index.entry(filter.field_name.clone()).or_default();
        for value in &filter.values {
            buckets
                .entry(value.clone())
                .or_default()
                .insert(definition.id.clone());
        }
    }
}
