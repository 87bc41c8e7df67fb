// src/services/session_table.rs
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{ActiveSession, ActiveSessionsFilter, Session};

/// A resource slot held on behalf of an origin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub limit_id: String,
    pub slot: i64,
}

/// Active sessions keyed by OriginID, one entry per run
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<String, Vec<Session>>,
    /// Slots reserved by origins that have no session runs (allocate-only initiation)
    allocations: DashMap<String, Allocation>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Serializes lifecycle calls on one OriginID; the lock entry is dropped with the last holder
pub struct OriginGuard<'a> {
    table: &'a SessionTable,
    origin_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OriginGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.table
            .locks
            .remove_if(&self.origin_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `origin_id`; other origins are not affected
    pub async fn lock(&self, origin_id: &str) -> OriginGuard<'_> {
        let lock = self
            .locks
            .entry(origin_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;

        OriginGuard {
            table: self,
            origin_id: origin_id.to_string(),
            guard: Some(guard),
        }
    }

    pub fn insert(&self, session: Session) {
        self.sessions
            .entry(session.origin_id.clone())
            .or_default()
            .push(session);
    }

    pub fn contains(&self, origin_id: &str) -> bool {
        self.sessions.contains_key(origin_id)
    }

    pub fn get(&self, origin_id: &str) -> Option<Vec<Session>> {
        self.sessions.get(origin_id).map(|runs| runs.value().clone())
    }

    /// Applies `f` to every run of `origin_id`; `None` when not tracked
    pub fn update<F>(&self, origin_id: &str, mut f: F) -> Option<usize>
    where
        F: FnMut(&mut Session),
    {
        self.sessions.get_mut(origin_id).map(|mut runs| {
            runs.iter_mut().for_each(&mut f);
            runs.len()
        })
    }

    pub fn remove(&self, origin_id: &str) -> Option<Vec<Session>> {
        self.sessions.remove(origin_id).map(|(_, runs)| runs)
    }

    pub fn snapshot(&self, filter: &ActiveSessionsFilter) -> Vec<ActiveSession> {
        let mut active: Vec<ActiveSession> = self
            .sessions
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|s| filter.matches(s))
                    .map(|s| s.summary())
                    .collect::<Vec<_>>()
            })
            .collect();
        active.sort_by(|a, b| a.origin_id.cmp(&b.origin_id).then_with(|| a.run_id.cmp(&b.run_id)));
        active
    }

    pub fn hold(&self, origin_id: &str, allocation: Allocation) {
        self.allocations.insert(origin_id.to_string(), allocation);
    }

    pub fn held(&self, origin_id: &str) -> Option<Allocation> {
        self.allocations.get(origin_id).map(|a| a.value().clone())
    }

    pub fn take_held(&self, origin_id: &str) -> Option<Allocation> {
        self.allocations.remove(origin_id).map(|(_, a)| a)
    }

    /// Drops allocation-only entries for which `keep` is false; returns how many went
    pub fn retain_held<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&Allocation) -> bool,
    {
        let before = self.allocations.len();
        self.allocations.retain(|_, a| keep(a));
        before - self.allocations.len()
    }

    /// Origins whose most recent update is older than `cutoff`
    pub fn idle_since(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().iter().all(|s| s.last_update < cutoff))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of tracked entries across all runs
    pub fn len(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
