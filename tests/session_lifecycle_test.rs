// tests/session_lifecycle_test.rs
//! Session lifecycle tests
//!
//! Drives SessionManager through authorize, initiate, update, terminate,
//! one-shot events and CDR processing with in-memory stores and
//! deterministic collaborators.

mod fixtures;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use apolo_session_engine::error::EngineError;
use apolo_session_engine::models::{
    ActiveSessionsFilter, AuthorizeArgs, CacheResourceLimitsArgs, CdrFilter, InitSessionArgs,
    ProcessEventArgs, TerminateSessionArgs, UpdateSessionArgs,
};
use apolo_session_engine::services::session_manager::TTL_DISCONNECT_REASON;
use apolo_session_engine::services::SessionManager;
use apolo_session_engine::traits::ResourceLimitStore;

use fixtures::{
    account_limit, busy_trigger, call_event, harness, harness_full, harness_with, FakeRating,
    StalledExecutor, RES_ACNT_1001,
};

const FIVE_MINUTES_NS: i64 = 300_000_000_000;

fn init_args(origin_id: &str, usage: &str) -> InitSessionArgs {
    InitSessionArgs {
        init_session: true,
        allocate_resources: true,
        get_attributes: true,
        timeout_ms: None,
        cgr_event: call_event("TestSSv1ItInitiateSession", origin_id, usage),
    }
}

fn update_args(origin_id: &str, usage: &str) -> UpdateSessionArgs {
    UpdateSessionArgs {
        update_session: true,
        get_attributes: true,
        timeout_ms: None,
        cgr_event: call_event("TestSSv1ItUpdateSession", origin_id, usage),
    }
}

fn terminate_args(origin_id: &str, usage: &str) -> TerminateSessionArgs {
    TerminateSessionArgs {
        terminate_session: true,
        release_resources: true,
        timeout_ms: None,
        cgr_event: call_event("TestSSv1ItTerminateSession", origin_id, usage),
    }
}

fn active_count(manager: &SessionManager) -> usize {
    manager
        .get_active_sessions(&ActiveSessionsFilter::default())
        .map(|active| active.len())
        .unwrap_or(0)
}

async fn cost_of(manager: &SessionManager, origin_id: &str, run_id: &str) -> rust_decimal::Decimal {
    let filter = CdrFilter {
        run_ids: vec![run_id.to_string()],
        origin_ids: vec![origin_id.to_string()],
    };
    let cdrs = manager.get_cdrs(&filter).await.unwrap();
    assert_eq!(cdrs.len(), 1, "{} {}", origin_id, run_id);
    cdrs[0].cost
}

/// CDRs are generated in the background; poll until `expected` are stored
async fn wait_for_cdrs(manager: &SessionManager, expected: i64) -> i64 {
    let mut count = 0;
    for _ in 0..100 {
        count = manager.count_cdrs(&CdrFilter::default()).await.unwrap();
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    count
}

#[tokio::test]
async fn test_authorize_never_tracks_sessions() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    let args = AuthorizeArgs {
        get_max_usage: true,
        authorize_resources: true,
        get_suppliers: true,
        get_attributes: true,
        timeout_ms: None,
        cgr_event: call_event("TestSSv1ItAuth", "TestSSv1It1", "5m"),
    };

    let reply = h.manager.authorize(args.clone()).await.unwrap();
    assert_eq!(reply.max_usage, Some(FIVE_MINUTES_NS));
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert!(reply.resource_denied.is_none());
    assert_eq!(reply.suppliers.unwrap().sorted_suppliers.len(), 2);
    assert_eq!(reply.attributes.unwrap().altered_fields, vec!["OfficeGroup"]);

    // Provisional only: repeating it keeps granting and nothing is reserved
    let again = h.manager.authorize(args).await.unwrap();
    assert_eq!(again.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));

    let err = h
        .manager
        .get_active_sessions(&ActiveSessionsFilter::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_authorize_with_digest() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    let reply = h
        .manager
        .authorize_with_digest(AuthorizeArgs {
            get_max_usage: true,
            authorize_resources: true,
            get_suppliers: true,
            get_attributes: true,
            timeout_ms: None,
            cgr_event: call_event("TestSSv1ItAuthWithDigest", "TestSSv1It1", "5m"),
        })
        .await
        .unwrap();

    assert_eq!(reply.max_usage, Some(300.0));
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(reply.suppliers_digest.as_deref(), Some("supplier1,supplier2"));
    assert_eq!(reply.attributes_digest.as_deref(), Some("OfficeGroup:Marketing"));
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;
    let sm = &h.manager;

    // Initiate: one primary and one digest run
    let reply = sm.initiate(init_args("TestSSv1It1", "5m")).await.unwrap();
    assert_eq!(reply.max_usage, Some(FIVE_MINUTES_NS));
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(active_count(sm), 2);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));

    // Digest initiate on the same origin reuses the allocation
    let reply = sm
        .initiate_with_digest(init_args("TestSSv1It1", "5m"))
        .await
        .unwrap();
    assert_eq!(reply.max_usage, Some(300.0));
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(reply.attributes_digest.as_deref(), Some("OfficeGroup:Marketing"));
    assert_eq!(active_count(sm), 4);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));

    // Update touches every run without adding entries
    let reply = sm.update(update_args("TestSSv1It1", "5m")).await.unwrap();
    assert_eq!(reply.max_usage, Some(FIVE_MINUTES_NS));
    let active = sm
        .get_active_sessions(&ActiveSessionsFilter::default())
        .unwrap();
    assert_eq!(active.len(), 4);
    assert!(active.iter().all(|s| s.usage == FIVE_MINUTES_NS));

    // Terminate removes the origin and frees the slot
    assert_ok!(sm.terminate(terminate_args("TestSSv1It1", "10m")).await);
    assert!(sm
        .get_active_sessions(&ActiveSessionsFilter::default())
        .unwrap_err()
        .is_not_found());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));

    // One-shot event reserves without tracking a session
    let reply = sm
        .process_event(ProcessEventArgs {
            allocate_resources: true,
            debit: true,
            get_attributes: true,
            timeout_ms: None,
            cgr_event: call_event("TestSSv1ItProcessEvent", "TestSSv1It2", "5m"),
        })
        .await
        .unwrap();
    assert_eq!(reply.max_usage, Some(FIVE_MINUTES_NS));
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(active_count(sm), 0);

    // CDRs: three runs for each processed event
    assert_ok!(sm.process_cdr(call_event("TestSSv1ItProcessCDR", "TestSSv1It1", "10m")));
    assert_ok!(sm.process_cdr(call_event("TestSSv1ItProcessCDR", "TestSSv1It2", "5m")));
    assert_eq!(wait_for_cdrs(sm, 6).await, 6);

    assert_eq!(cost_of(sm, "TestSSv1It1", "*raw").await, dec!(-1));
    assert_eq!(cost_of(sm, "TestSSv1It1", "CustomerCharges").await, dec!(0.198));
    assert_eq!(cost_of(sm, "TestSSv1It1", "SupplierCharges").await, dec!(0.102));
    assert_eq!(cost_of(sm, "TestSSv1It2", "CustomerCharges").await, dec!(0.099));
    assert_eq!(cost_of(sm, "TestSSv1It2", "SupplierCharges").await, dec!(0.051));
}

#[tokio::test]
async fn test_initiate_denied_when_limit_exhausted() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    assert_ok!(h.manager.initiate(init_args("call-a", "5m")).await);

    let reply = h.manager.initiate(init_args("call-b", "5m")).await.unwrap();
    assert_eq!(reply.max_usage, Some(0));
    assert_eq!(reply.resource_denied.as_deref(), Some(RES_ACNT_1001));
    assert!(reply.resource_allocation.is_none());

    assert!(h.manager.sessions().contains("call-a"));
    assert!(!h.manager.sessions().contains("call-b"));
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));

    // Once call-a ends, call-b is admitted
    assert_ok!(h.manager.terminate(terminate_args("call-a", "1m")).await);
    let reply = h.manager.initiate(init_args("call-b", "5m")).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
}

#[tokio::test]
async fn test_unmatched_event_is_unconstrained() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    let mut args = init_args("call-2001", "5m");
    args.cgr_event = args.cgr_event.with_field("Account", "2001");

    let reply = h.manager.initiate(args).await.unwrap();
    assert!(reply.resource_allocation.is_none());
    assert!(reply.resource_denied.is_none());
    assert_eq!(h.manager.sessions().len(), 2);
}

#[tokio::test]
async fn test_update_and_terminate_unknown_session() {
    let h = harness(vec![]).await;

    let err = h.manager.update(update_args("ghost", "1m")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = h
        .manager
        .terminate(terminate_args("ghost", "1m"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_missing_origin_is_rejected() {
    let h = harness(vec![]).await;
    let mut args = init_args("x", "5m");
    args.cgr_event.event.remove("OriginID");

    let err = assert_err!(h.manager.initiate(args).await);
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    assert!(h.manager.sessions().is_empty());
}

#[tokio::test]
async fn test_collaborator_timeout_leaves_no_reservation() {
    let h = harness_with(
        vec![account_limit(RES_ACNT_1001, "1001", 1)],
        Arc::new(FakeRating::slow(Duration::from_millis(200))),
    )
    .await;

    let mut args = init_args("slow-call", "5m");
    args.timeout_ms = Some(20);

    let err = h.manager.initiate(args).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
    assert!(h.manager.sessions().is_empty());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
}

#[tokio::test]
async fn test_allocation_without_session_is_released_on_terminate() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    let mut args = init_args("alloc-only", "5m");
    args.init_session = false;
    let reply = h.manager.initiate(args).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert!(reply.max_usage.is_none());
    assert!(h.manager.sessions().is_empty());
    assert!(h.manager.sessions().held("alloc-only").is_some());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));

    assert_ok!(h.manager.terminate(terminate_args("alloc-only", "0s")).await);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
    assert!(h.manager.sessions().held("alloc-only").is_none());

    // Nothing left to release
    let err = assert_err!(h.manager.terminate(terminate_args("alloc-only", "0s")).await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_session_takes_over_earlier_allocation() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;

    let mut args = init_args("two-step", "5m");
    args.init_session = false;
    assert_ok!(h.manager.initiate(args).await);

    let reply = h.manager.initiate(init_args("two-step", "5m")).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(h.manager.sessions().len(), 2);
    assert!(h.manager.sessions().held("two-step").is_none());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));

    assert_ok!(h.manager.terminate(terminate_args("two-step", "1m")).await);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
}

#[tokio::test]
async fn test_released_slot_is_not_reused_by_its_former_holder() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;
    assert_ok!(h.manager.initiate(init_args("call-a", "5m")).await);

    // Release only: the runs stay, the slot goes back
    let mut release = terminate_args("call-a", "1m");
    release.terminate_session = false;
    assert_ok!(h.manager.terminate(release).await);
    assert!(h.manager.sessions().contains("call-a"));
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
    let active = h
        .manager
        .get_active_sessions(&ActiveSessionsFilter::default())
        .unwrap();
    assert!(active.iter().all(|s| s.resource_allocation.is_none()));

    let reply = h.manager.initiate(init_args("call-b", "5m")).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));

    // call-a has to compete for a slot again
    let reply = h.manager.initiate(init_args("call-a", "5m")).await.unwrap();
    assert_eq!(reply.resource_denied.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(reply.max_usage, Some(0));
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));
}

#[tokio::test]
async fn test_denied_event_is_not_debited() {
    let rating = Arc::new(FakeRating::new());
    let h = harness_with(vec![account_limit(RES_ACNT_1001, "1001", 1)], rating.clone()).await;

    let args = |id: &str| ProcessEventArgs {
        allocate_resources: true,
        debit: true,
        get_attributes: false,
        timeout_ms: None,
        cgr_event: call_event(id, id, "5m"),
    };

    let reply = h.manager.process_event(args("event-1")).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(reply.max_usage, Some(FIVE_MINUTES_NS));

    let reply = h.manager.process_event(args("event-2")).await.unwrap();
    assert_eq!(reply.resource_denied.as_deref(), Some(RES_ACNT_1001));
    assert_eq!(reply.max_usage, Some(0));

    assert_eq!(rating.debit_count(), 1);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));
}

#[tokio::test]
async fn test_abandoned_event_returns_its_slot() {
    let rating = Arc::new(FakeRating::slow(Duration::from_millis(300)));
    let h = harness_with(vec![account_limit(RES_ACNT_1001, "1001", 1)], rating.clone()).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.manager.process_event(ProcessEventArgs {
            allocate_resources: true,
            debit: true,
            get_attributes: false,
            timeout_ms: None,
            cgr_event: call_event("event-dropped", "event-dropped", "5m"),
        }),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(rating.debit_count(), 1);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
}

#[tokio::test]
async fn test_slow_actions_do_not_stall_initiate() {
    let mut limit = account_limit(RES_ACNT_1001, "1001", 2);
    limit.action_triggers = vec![busy_trigger()];
    let h = harness_full(
        vec![limit],
        Arc::new(FakeRating::new()),
        Some(Arc::new(StalledExecutor)),
    )
    .await;

    let mut args = init_args("busy-call", "5m");
    args.timeout_ms = Some(50);

    let reply = tokio::time::timeout(Duration::from_millis(500), h.manager.initiate(args))
        .await
        .expect("initiate waited on the action executor")
        .unwrap();

    assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    assert!(h.manager.sessions().contains("busy-call"));
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_origins() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 50)]).await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let sm = Arc::clone(&h.manager);
            tokio::spawn(async move { sm.initiate(init_args(&format!("call-{}", i), "5m")).await })
        })
        .collect();

    for handle in handles {
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply.resource_allocation.as_deref(), Some(RES_ACNT_1001));
    }

    assert_eq!(h.manager.sessions().len(), 40);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(20));
    assert_eq!(h.manager.sessions().lock_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admission_never_exceeds_limit() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 5)]).await;

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let sm = Arc::clone(&h.manager);
            tokio::spawn(async move { sm.initiate(init_args(&format!("burst-{}", i), "5m")).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().resource_allocation.is_some() {
            granted += 1;
        }
    }

    assert_eq!(granted, 5);
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(5));
    assert_eq!(h.manager.sessions().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_origin_update_and_terminate_serialize() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;
    assert_ok!(h.manager.initiate(init_args("race", "5m")).await);

    let sm = Arc::clone(&h.manager);
    let update = tokio::spawn(async move { sm.update(update_args("race", "1m")).await });
    let sm = Arc::clone(&h.manager);
    let terminate = tokio::spawn(async move { sm.terminate(terminate_args("race", "2m")).await });

    let update = update.await.unwrap();
    assert_ok!(terminate.await.unwrap());

    // Update either ran first or found the origin gone; it never resurrects it
    if let Err(e) = update {
        assert!(e.is_not_found());
    }
    assert!(h.manager.sessions().is_empty());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));
}

#[tokio::test]
async fn test_ttl_sweep_terminates_and_notifies() {
    let h = harness(vec![account_limit(RES_ACNT_1001, "1001", 1)]).await;
    assert_ok!(h.manager.initiate(init_args("idle-call", "5m")).await);

    // Nothing is idle yet
    assert_eq!(h.manager.sweep_idle(Utc::now(), Duration::from_secs(3600)).await, 0);

    let later = Utc::now() + ChronoDuration::hours(2);
    assert_eq!(h.manager.sweep_idle(later, Duration::from_secs(3600)).await, 1);

    assert!(h.manager.sessions().is_empty());
    assert_eq!(h.limiter.usage(RES_ACNT_1001, Utc::now()), Some(0));

    let disconnects = h.notifier.disconnects.lock();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].reason, TTL_DISCONNECT_REASON);
    assert_eq!(disconnects[0].event_start.origin_id().unwrap(), "idle-call");
}

#[tokio::test]
async fn test_cache_reload_picks_up_new_limit() {
    let h = harness(vec![]).await;

    let reply = h.manager.initiate(init_args("before", "5m")).await.unwrap();
    assert!(reply.resource_allocation.is_none());

    h.store
        .set(&account_limit("RES_ACNT_1001_NEW", "1001", 2))
        .await
        .unwrap();
    assert_ok!(
        h.manager
            .cache_resource_limits(CacheResourceLimitsArgs {
                load_id: "LOAD_1".to_string(),
                resource_limit_ids: Some(vec!["RES_ACNT_1001_NEW".to_string()]),
            })
            .await
    );

    let reply = h.manager.initiate(init_args("after", "5m")).await.unwrap();
    assert_eq!(reply.resource_allocation.as_deref(), Some("RES_ACNT_1001_NEW"));
}
