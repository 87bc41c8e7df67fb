// src/config.rs
use std::env;
use std::time::Duration;

use crate::models::RAW_RUN_ID;
use crate::services::SessionManagerConfig;

pub const DEFAULT_CDR_RUN_IDS: &str = "*raw,CustomerCharges,SupplierCharges";

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// In-memory definition store when unset
    pub redis_url: Option<String>,
    /// In-memory CDR store when unset
    pub database_url: Option<String>,
    pub database_pool_size: usize,
    pub cgrates_url: String,
    pub cgrates_tenant: String,
    pub cgrates_timeout_ms: u64,
    pub agent_url: Option<String>,
    pub rls_usage_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub session_ttl_check_secs: u64,
    pub max_call_duration_secs: u64,
    pub cdr_run_ids: Vec<String>,
    pub collaborator_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        Ok(Config {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "production".to_string()),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "2012".to_string())
                .parse()?,
            redis_url: optional("REDIS_URL"),
            database_url: optional("DATABASE_URL"),
            database_pool_size: parse_or("DATABASE_POOL_SIZE", 16)?,
            cgrates_url: env::var("CGRATES_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:2080/jsonrpc".to_string()),
            cgrates_tenant: env::var("CGRATES_TENANT")
                .unwrap_or_else(|_| "cgrates.org".to_string()),
            cgrates_timeout_ms: parse_or("CGRATES_TIMEOUT_MS", 500)?,
            agent_url: optional("AGENT_URL"),
            rls_usage_ttl_secs: parse_or("RLS_USAGE_TTL_SECS", 10_800)?,
            session_ttl_secs: parse_or("SESSION_TTL_SECS", 0)?,
            session_ttl_check_secs: parse_or("SESSION_TTL_CHECK_SECS", 60)?,
            max_call_duration_secs: parse_or("MAX_CALL_DURATION_SECS", 10_800)?,
            cdr_run_ids: Self::parse_run_ids(
                &env::var("CDR_RUN_IDS").unwrap_or_else(|_| DEFAULT_CDR_RUN_IDS.to_string()),
            ),
            collaborator_timeout_ms: parse_or("COLLABORATOR_TIMEOUT_MS", 2_000)?,
        })
    }

    /// Comma separated run IDs; `*raw` is always first so every event keeps an unrated record
    pub fn parse_run_ids(run_ids_str: &str) -> Vec<String> {
        let mut run_ids = vec![RAW_RUN_ID.to_string()];

        for run_id in run_ids_str.split(',').map(str::trim) {
            if !run_id.is_empty() && !run_ids.iter().any(|r| r == run_id) {
                run_ids.push(run_id.to_string());
            }
        }

        run_ids
    }

    pub fn usage_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rls_usage_ttl_secs as i64)
    }

    pub fn session_manager(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            collaborator_timeout: Duration::from_millis(self.collaborator_timeout_ms),
            max_call_duration: Duration::from_secs(self.max_call_duration_secs),
            session_ttl: (self.session_ttl_secs > 0)
                .then(|| Duration::from_secs(self.session_ttl_secs)),
            ttl_check_interval: Duration::from_secs(self.session_ttl_check_secs.max(1)),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.trim().parse()?),
        Err(_) => Ok(default),
    }
}
