// src/database/pool.rs
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

use crate::error::EngineError;

pub type DbPool = Pool;

/// Pool for the CDR store; one connection is checked out before the pool is handed back
pub async fn create_pool(database_url: &str, max_size: usize) -> Result<DbPool, EngineError> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_size.max(1)));

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| EngineError::Storage(format!("CDR pool: {}", e)))?;

    let client = pool
        .get()
        .await
        .map_err(|e| EngineError::Storage(format!("CDR database unreachable: {}", e)))?;
    client.simple_query("SELECT 1").await?;

    info!("CDR database reachable (pool size {})", max_size.max(1));
    Ok(pool)
}
