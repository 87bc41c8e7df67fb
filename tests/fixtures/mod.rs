// tests/fixtures/mod.rs
//! Deterministic collaborators and event builders shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apolo_session_engine::cache::MemoryResourceStore;
use apolo_session_engine::database::MemoryCdrStore;
use apolo_session_engine::error::EngineError;
use apolo_session_engine::models::{
    fields, threshold_types, ActionTrigger, AttrProcessEventReply, CgrEvent, DisconnectSessionArgs, RequestFilter, ResourceLimit,
    SortedSupplier, SortedSuppliers, UsageSlots, OK,
};
use apolo_session_engine::services::{
    CdrGenerator, ResourceLimiterService, SessionManager, SessionManagerConfig,
};
use apolo_session_engine::traits::{
    ActionExecutor, AttributeService, RatingService, SessionNotifier, SupplierService,
};

pub const TENANT: &str = "cgrates.org";
pub const RES_ACNT_1001: &str = "RES_ACNT_1001";

/// Per-minute prices reproducing the reference charges (10m -> 0.198 / 0.102)
pub struct FakeRating {
    pub delay: Option<Duration>,
    /// Debits started, completed or not
    pub debits: AtomicUsize,
}

impl FakeRating {
    pub fn new() -> Self {
        Self {
            delay: None,
            debits: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            debits: AtomicUsize::new(0),
        }
    }

    pub fn debit_count(&self) -> usize {
        self.debits.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RatingService for FakeRating {
    async fn max_usage(&self, _event: &CgrEvent, requested: Duration) -> Result<Duration, EngineError> {
        self.pause().await;
        Ok(requested)
    }

    async fn debit(&self, _event: &CgrEvent, usage: Duration) -> Result<Duration, EngineError> {
        self.debits.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(usage)
    }

    async fn cost(&self, event: &CgrEvent, run_id: &str) -> Result<Decimal, EngineError> {
        self.pause().await;
        let minutes = Decimal::from(event.usage()?.unwrap_or_default().as_secs()) / dec!(60);
        match run_id {
            "CustomerCharges" => Ok(minutes * dec!(0.0198)),
            "SupplierCharges" => Ok(minutes * dec!(0.0102)),
            other => Err(EngineError::NotFound(format!("rating plan for run {}", other))),
        }
    }
}

/// Tags every event with OfficeGroup=Marketing
pub struct FakeAttributes;

#[async_trait]
impl AttributeService for FakeAttributes {
    async fn process_event(&self, event: &CgrEvent) -> Result<AttrProcessEventReply, EngineError> {
        let mut altered = event.clone();
        altered
            .event
            .insert("OfficeGroup".to_string(), "Marketing".into());

        Ok(AttrProcessEventReply {
            matched_profiles: vec!["ATTR_ACNT_1001".to_string()],
            altered_fields: vec!["OfficeGroup".to_string()],
            cgr_event: altered,
        })
    }
}

pub struct FakeSuppliers;

#[async_trait]
impl SupplierService for FakeSuppliers {
    async fn sorted_suppliers(&self, _event: &CgrEvent) -> Result<SortedSuppliers, EngineError> {
        Ok(SortedSuppliers {
            profile_id: "SPL_ACNT_1001".to_string(),
            sorting: "*weight".to_string(),
            sorted_suppliers: ["supplier1", "supplier2"]
                .iter()
                .map(|id| SortedSupplier {
                    supplier_id: id.to_string(),
                    sorting_data: Default::default(),
                })
                .collect(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub disconnects: Mutex<Vec<DisconnectSessionArgs>>,
}

#[async_trait]
impl SessionNotifier for RecordingNotifier {
    async fn disconnect_session(&self, args: &DisconnectSessionArgs) -> Result<String, EngineError> {
        self.disconnects.lock().push(args.clone());
        Ok(OK.to_string())
    }
}

/// Action executor that takes far longer than any request deadline
pub struct StalledExecutor;

#[async_trait]
impl ActionExecutor for StalledExecutor {
    async fn execute(&self, _: &str, _: &ActionTrigger, _: f64) -> Result<(), EngineError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Trigger firing as soon as one slot is in use
pub fn busy_trigger() -> ActionTrigger {
    ActionTrigger {
        id: "AT_RES_BUSY".to_string(),
        threshold_type: threshold_types::MAX_USAGE.to_string(),
        threshold_value: 1.0,
        actions_id: "LOG_WARNING".to_string(),
        executed: false,
    }
}

pub fn account_limit(id: &str, account: &str, capacity: u32) -> ResourceLimit {
    ResourceLimit {
        id: id.to_string(),
        filters: vec![
            RequestFilter::exact(fields::ACCOUNT, &[account]),
            RequestFilter::exact(fields::DESTINATION, &["1002", "1003"]),
        ],
        activation_time: Utc::now() - ChronoDuration::days(1),
        weight: 10.0,
        limit: capacity,
        action_triggers: vec![],
        used: UsageSlots::new(),
    }
}

/// Call event from account 1001 to 1002
pub fn call_event(id: &str, origin_id: &str, usage: &str) -> CgrEvent {
    CgrEvent::new(TENANT, id)
        .with_field(fields::TENANT, TENANT)
        .with_field(fields::CATEGORY, "call")
        .with_field(fields::TOR, "*voice")
        .with_field(fields::ORIGIN_ID, origin_id)
        .with_field(fields::REQUEST_TYPE, "*prepaid")
        .with_field(fields::ACCOUNT, "1001")
        .with_field(fields::SUBJECT, "ANY2CNT")
        .with_field(fields::DESTINATION, "1002")
        .with_field(fields::SETUP_TIME, "2018-01-07T17:00:00Z")
        .with_field(fields::ANSWER_TIME, "2018-01-07T17:00:10Z")
        .with_field(fields::USAGE, usage)
}

pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub limiter: Arc<ResourceLimiterService>,
    pub store: Arc<MemoryResourceStore>,
    pub cdrs: Arc<MemoryCdrStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness(limits: Vec<ResourceLimit>) -> Harness {
    harness_with(limits, Arc::new(FakeRating::new())).await
}

pub async fn harness_with(limits: Vec<ResourceLimit>, rating: Arc<FakeRating>) -> Harness {
    harness_full(limits, rating, None).await
}

pub async fn harness_full(
    limits: Vec<ResourceLimit>,
    rating: Arc<FakeRating>,
    executor: Option<Arc<dyn ActionExecutor>>,
) -> Harness {
    let store = Arc::new(MemoryResourceStore::with_limits(limits));
    let limiter = Arc::new(ResourceLimiterService::new(
        store.clone(),
        ChronoDuration::hours(3),
        executor,
    ));
    limiter.start().await.expect("limiter start");

    let cdrs = Arc::new(MemoryCdrStore::new());
    let generator = CdrGenerator::new(
        cdrs.clone(),
        rating.clone(),
        vec![
            "*raw".to_string(),
            "CustomerCharges".to_string(),
            "SupplierCharges".to_string(),
        ],
        "127.0.0.1".to_string(),
        Duration::from_secs(1),
    );

    let notifier = Arc::new(RecordingNotifier::default());
    let manager = Arc::new(SessionManager::new(
        limiter.clone(),
        rating,
        Arc::new(FakeAttributes),
        Arc::new(FakeSuppliers),
        Some(notifier.clone() as Arc<dyn SessionNotifier>),
        generator,
        SessionManagerConfig {
            collaborator_timeout: Duration::from_secs(1),
            ..Default::default()
        },
    ));

    Harness {
        manager,
        limiter,
        store,
        cdrs,
        notifier,
    }
}
