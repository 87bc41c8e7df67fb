// src/cache/mod.rs
pub mod redis_client;
pub mod memory_store;
pub mod resource_cache;

pub use redis_client::RedisClient;
pub use memory_store::MemoryResourceStore;
pub use resource_cache::{ResourceCache, SharedLimit};

/// Helper for generating consistent cache keys
pub struct CacheKeys;

impl CacheKeys {
    /// Namespace of resource limit definitions
    pub const RESOURCE_LIMITS_PREFIX: &'static str = "rls_";

    /// Key for a resource limit definition: `rls_{id}`
    pub fn resource_limit(id: &str) -> String {
        format!("{}{}", Self::RESOURCE_LIMITS_PREFIX, id)
    }
}
