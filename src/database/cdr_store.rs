// src/database/cdr_store.rs
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_postgres::Row;
use tracing::{debug, error};

use crate::database::DbPool;
use crate::error::EngineError;
use crate::models::{Cdr, CdrFilter};
use crate::traits::CdrStore;

const CDR_COLUMNS: &str = "id, cgr_id, run_id, origin_host, origin_id, tenant, category, \
     request_type, account, subject, destination, setup_time, answer_time, usage, cost, created_at";

/// CDR persistence on the `session_cdrs` table
pub struct PostgresCdrStore {
    db_pool: DbPool,
}

impl PostgresCdrStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    /// Creates `session_cdrs` if missing; one row per (cgr_id, run_id)
    pub async fn ensure_schema(&self) -> Result<(), EngineError> {
        let client = self.client().await?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS session_cdrs (
                    id UUID PRIMARY KEY,
                    cgr_id TEXT NOT NULL,
                    run_id TEXT NOT NULL,
                    origin_host TEXT NOT NULL,
                    origin_id TEXT NOT NULL,
                    tenant TEXT NOT NULL,
                    category TEXT NOT NULL,
                    request_type TEXT NOT NULL,
                    account TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    destination TEXT NOT NULL,
                    setup_time TIMESTAMPTZ,
                    answer_time TIMESTAMPTZ,
                    usage BIGINT NOT NULL,
                    cost NUMERIC NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    UNIQUE (cgr_id, run_id)
                );
                CREATE INDEX IF NOT EXISTS idx_session_cdrs_origin_id ON session_cdrs (origin_id);",
            )
            .await?;
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, EngineError> {
        self.db_pool.get().await.map_err(|e| {
            error!("❌ Failed to get DB connection: {}", e);
            EngineError::Storage(e.to_string())
        })
    }

    fn row_to_cdr(row: &Row) -> Result<Cdr, EngineError> {
        Ok(Cdr {
            id: row.try_get("id")?,
            cgr_id: row.try_get("cgr_id")?,
            run_id: row.try_get("run_id")?,
            origin_host: row.try_get("origin_host")?,
            origin_id: row.try_get("origin_id")?,
            tenant: row.try_get("tenant")?,
            category: row.try_get("category")?,
            request_type: row.try_get("request_type")?,
            account: row.try_get("account")?,
            subject: row.try_get("subject")?,
            destination: row.try_get("destination")?,
            setup_time: row.try_get("setup_time")?,
            answer_time: row.try_get("answer_time")?,
            usage: row.try_get("usage")?,
            cost: row.try_get("cost")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

// `$1` run IDs, `$2` origin IDs; an empty array does not constrain
const FILTER_CLAUSE: &str = "WHERE (cardinality($1::text[]) = 0 OR run_id = ANY($1)) \
     AND (cardinality($2::text[]) = 0 OR origin_id = ANY($2))";

#[async_trait]
impl CdrStore for PostgresCdrStore {
    async fn store(&self, cdr: &Cdr) -> Result<(), EngineError> {
        let client = self.client().await?;

        client
            .execute(
                "INSERT INTO session_cdrs
                 (id, cgr_id, run_id, origin_host, origin_id, tenant, category, request_type,
                  account, subject, destination, setup_time, answer_time, usage, cost, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                 ON CONFLICT (cgr_id, run_id) DO UPDATE
                 SET usage = EXCLUDED.usage, cost = EXCLUDED.cost, answer_time = EXCLUDED.answer_time",
                &[
                    &cdr.id,
                    &cdr.cgr_id,
                    &cdr.run_id,
                    &cdr.origin_host,
                    &cdr.origin_id,
                    &cdr.tenant,
                    &cdr.category,
                    &cdr.request_type,
                    &cdr.account,
                    &cdr.subject,
                    &cdr.destination,
                    &cdr.setup_time,
                    &cdr.answer_time,
                    &cdr.usage,
                    &cdr.cost,
                    &cdr.created_at,
                ],
            )
            .await?;

        debug!("CDR stored: cgrid={}, run={}", cdr.cgr_id, cdr.run_id);
        Ok(())
    }

    async fn get_cdrs(&self, filter: &CdrFilter) -> Result<Vec<Cdr>, EngineError> {
        let client = self.client().await?;
        let query = format!(
            "SELECT {} FROM session_cdrs {} ORDER BY created_at, run_id",
            CDR_COLUMNS, FILTER_CLAUSE
        );

        let rows = client
            .query(query.as_str(), &[&filter.run_ids, &filter.origin_ids])
            .await?;

        rows.iter().map(Self::row_to_cdr).collect()
    }

    async fn count_cdrs(&self, filter: &CdrFilter) -> Result<i64, EngineError> {
        let client = self.client().await?;
        let query = format!("SELECT COUNT(*) FROM session_cdrs {}", FILTER_CLAUSE);

        let row = client
            .query_one(query.as_str(), &[&filter.run_ids, &filter.origin_ids])
            .await?;

        Ok(row.get(0))
    }
}

/// Process-local CDR store, used when no database is configured and in tests
#[derive(Default)]
pub struct MemoryCdrStore {
    cdrs: RwLock<Vec<Cdr>>,
}

impl MemoryCdrStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CdrStore for MemoryCdrStore {
    async fn store(&self, cdr: &Cdr) -> Result<(), EngineError> {
        let mut cdrs = self.cdrs.write();
        match cdrs
            .iter_mut()
            .find(|c| c.cgr_id == cdr.cgr_id && c.run_id == cdr.run_id)
        {
            Some(existing) => *existing = cdr.clone(),
            None => cdrs.push(cdr.clone()),
        }
        Ok(())
    }

    async fn get_cdrs(&self, filter: &CdrFilter) -> Result<Vec<Cdr>, EngineError> {
        Ok(self
            .cdrs
            .read()
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn count_cdrs(&self, filter: &CdrFilter) -> Result<i64, EngineError> {
        Ok(self.cdrs.read().iter().filter(|c| filter.matches(c)).count() as i64)
    }
}
