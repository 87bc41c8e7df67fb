// src/services/cdr_generator.rs
use crate::error::EngineError;
use crate::models::event::duration_to_nanos;
use crate::models::{fields, Cdr, CdrFilter, CgrEvent, RAW_RUN_ID};
use crate::services::bounded;
use crate::traits::{CdrStore, RatingService};
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use tracing::{info, error, debug};

/// Turns finalized events into one CDR per configured run
#[derive(Clone)]
pub struct CdrGenerator {
    store: Arc<dyn CdrStore>,
    rating: Arc<dyn RatingService>,
    run_ids: Vec<String>,
    origin_host: String,
    timeout: Duration,
}

impl CdrGenerator {
    pub fn new(
        store: Arc<dyn CdrStore>,
        rating: Arc<dyn RatingService>,
        run_ids: Vec<String>,
        origin_host: String,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            rating,
            run_ids,
            origin_host,
            timeout,
        }
    }

    /// Validates the event, then rates and stores its CDRs in the background
    pub fn process_cdr(&self, event: CgrEvent) -> Result<(), EngineError> {
        let origin_id = event.origin_id()?;
        event.usage()?;

        let generator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = generator.generate_cdrs(&event).await {
                error!("❌ CDR generation failed for {}: {}", origin_id, e);
            }
        });

        Ok(())
    }

    /// `*raw` is stored unrated (cost -1); every other run gets its cost from rating
    pub async fn generate_cdrs(&self, event: &CgrEvent) -> Result<Vec<Cdr>, EngineError> {
        let origin_id = event.origin_id()?;
        let cgr_id = event.cgr_id();
        let usage = event.usage()?.unwrap_or_default();

        info!(
            "📝 Generating {} CDRs for {} (cgrid {}, usage {:?})",
            self.run_ids.len(),
            origin_id,
            cgr_id,
            usage
        );

        let mut cdrs = Vec::with_capacity(self.run_ids.len());
        for run_id in &self.run_ids {
            let cost = if run_id == RAW_RUN_ID {
                Decimal::NEGATIVE_ONE
            } else {
                bounded("rating", self.timeout, self.rating.cost(event, run_id)).await?
            };

            let cdr = self.build(event, &cgr_id, &origin_id, run_id, usage, cost)?;
            self.store.store(&cdr).await?;
            debug!("CDR {} stored: run={}, cost={}", cdr.id, run_id, cost);
            cdrs.push(cdr);
        }

        info!("✅ {} CDRs generated for {}", cdrs.len(), origin_id);
        Ok(cdrs)
    }

    fn build(
        &self,
        event: &CgrEvent,
        cgr_id: &str,
        origin_id: &str,
        run_id: &str,
        usage: Duration,
        cost: Decimal,
    ) -> Result<Cdr, EngineError> {
        Ok(Cdr {
            id: Uuid::new_v4(),
            cgr_id: cgr_id.to_string(),
            run_id: run_id.to_string(),
            origin_host: event
                .field_as_string(fields::ORIGIN_HOST)
                .unwrap_or_else(|| self.origin_host.clone()),
            origin_id: origin_id.to_string(),
            tenant: event.tenant.clone(),
            category: event.string_or_empty(fields::CATEGORY),
            request_type: event.string_or_empty(fields::REQUEST_TYPE),
            account: event.string_or_empty(fields::ACCOUNT),
            subject: event.string_or_empty(fields::SUBJECT),
            destination: event.string_or_empty(fields::DESTINATION),
            setup_time: event.field_as_time(fields::SETUP_TIME)?,
            answer_time: event.field_as_time(fields::ANSWER_TIME)?,
            usage: duration_to_nanos(usage),
            cost,
            created_at: Utc::now(),
        })
    }

    pub async fn get_cdrs(&self, filter: &CdrFilter) -> Result<Vec<Cdr>, EngineError> {
        self.store.get_cdrs(filter).await
    }

    pub async fn count_cdrs(&self, filter: &CdrFilter) -> Result<i64, EngineError> {
        self.store.count_cdrs(filter).await
    }
}
