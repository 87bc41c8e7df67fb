// src/main.rs
use actix_web::{web, App, HttpServer, middleware};
use std::sync::Arc;
use tracing::{info, warn, error};

use apolo_session_engine::api::{self, MethodRegistry};
use apolo_session_engine::cache::{MemoryResourceStore, RedisClient};
use apolo_session_engine::cgrates::RpcClient;
use apolo_session_engine::config::Config;
use apolo_session_engine::database::{create_pool, MemoryCdrStore, PostgresCdrStore};
use apolo_session_engine::services::{CdrGenerator, ResourceLimiterService, SessionManager};
use apolo_session_engine::traits::{ActionExecutor, CdrStore, ResourceLimitStore, SessionNotifier};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .json()
        .init();

    info!("🚀 Starting Apolo Session Engine (Rust)");

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Environment: {}", config.environment);

    // Resource limit definitions
    let limit_store: Arc<dyn ResourceLimitStore> = match &config.redis_url {
        Some(url) => {
            let redis_client = RedisClient::new(url).await?;
            info!("✅ Redis client connected");
            Arc::new(redis_client)
        }
        None => {
            warn!("⚠️  REDIS_URL not set, using in-memory resource limit store");
            Arc::new(MemoryResourceStore::new())
        }
    };

    // CDR persistence
    let cdr_store: Arc<dyn CdrStore> = match &config.database_url {
        Some(url) => {
            let db_pool = create_pool(url, config.database_pool_size).await?;
            let store = PostgresCdrStore::new(db_pool);
            store.ensure_schema().await?;
            info!("✅ Database pool created");
            Arc::new(store)
        }
        None => {
            warn!("⚠️  DATABASE_URL not set, CDRs are kept in memory");
            Arc::new(MemoryCdrStore::new())
        }
    };

    // Collaborators
    let charging = Arc::new(RpcClient::new(
        &config.cgrates_url,
        &config.cgrates_tenant,
        config.cgrates_timeout_ms,
    )?);
    info!("✅ Charging collaborators at {}", config.cgrates_url);

    let notifier: Option<Arc<dyn SessionNotifier>> = match &config.agent_url {
        Some(url) => Some(Arc::new(RpcClient::new(
            url,
            &config.cgrates_tenant,
            config.cgrates_timeout_ms,
        )?)),
        None => {
            warn!("⚠️  AGENT_URL not set, disconnect notifications disabled");
            None
        }
    };

    // Services
    let limiter = Arc::new(ResourceLimiterService::new(
        limit_store,
        config.usage_ttl(),
        Some(charging.clone() as Arc<dyn ActionExecutor>),
    ));
    limiter.start().await?;

    let cdr_generator = CdrGenerator::new(
        cdr_store,
        charging.clone(),
        config.cdr_run_ids.clone(),
        charging.origin_host().to_string(),
        config.session_manager().collaborator_timeout,
    );

    let session_manager = Arc::new(SessionManager::new(
        limiter.clone(),
        charging.clone(),
        charging.clone(),
        charging.clone(),
        notifier,
        cdr_generator,
        config.session_manager(),
    ));
    let sweeper = session_manager.spawn_ttl_sweeper();

    let registry = Arc::new(MethodRegistry::for_sessions(session_manager.clone()));
    registry.verify()?;

    // HTTP Server
    let bind_address = format!("{}:{}", config.host, config.port);
    info!("🌐 Starting JSON-RPC server on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(registry.clone()))
            .configure(api::routes::configure)
    })
    .workers(8)
    .bind(&bind_address)?
    .run();

    if let Err(e) = server.await {
        error!("HTTP server error: {}", e);
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    limiter.shutdown().await?;
    info!("👋 Apolo Session Engine stopped");

    Ok(())
}
