// src/cache/redis_client.rs
use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager, AsyncCommands, RedisError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::CacheKeys;
use crate::error::EngineError;
use crate::models::ResourceLimit;
use crate::traits::ResourceLimitStore;

/// Redis-backed definition store; limits are JSON values under `rls_{id}`
#[derive(Clone)]
pub struct RedisClient {
    manager: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        // Test connection
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    // Helper to get a connection from the manager
    async fn get_connection(&self) -> ConnectionManager {
        let manager_guard = self.manager.lock().await;
        manager_guard.clone()
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, RedisError> {
        let mut conn = self.get_connection().await;
        debug!("Redis GET: {}", key);
        conn.get(key).await
    }

    pub async fn set_raw(&self, key: &str, value: &str) -> Result<(), RedisError> {
        let mut conn = self.get_connection().await;
        debug!("Redis SET: {}", key);
        conn.set(key, value).await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RedisError> {
        let mut conn = self.get_connection().await;
        debug!("Redis KEYS: {}*", prefix);
        conn.keys(format!("{}*", prefix)).await
    }
}

#[async_trait]
impl ResourceLimitStore for RedisClient {
    async fn get_all(&self) -> Result<Vec<ResourceLimit>, EngineError> {
        let keys = self.keys_with_prefix(CacheKeys::RESOURCE_LIMITS_PREFIX).await?;
        let mut limits = Vec::with_capacity(keys.len());

        for key in keys {
            match self.get_raw(&key).await? {
                Some(raw) => limits.push(serde_json::from_str(&raw)?),
                // Deleted between KEYS and GET
                None => warn!("Resource limit key {} vanished during load", key),
            }
        }

        Ok(limits)
    }

    async fn get(&self, id: &str) -> Result<Option<ResourceLimit>, EngineError> {
        match self.get_raw(&CacheKeys::resource_limit(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, limit: &ResourceLimit) -> Result<(), EngineError> {
        let raw = serde_json::to_string(limit)?;
        self.set_raw(&CacheKeys::resource_limit(&limit.id), &raw).await?;
        Ok(())
    }
}
