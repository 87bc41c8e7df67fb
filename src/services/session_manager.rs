// src/services/session_manager.rs
use crate::error::EngineError;
use crate::models::event::SESSIONS_CONTEXT;
use crate::models::{
    fields, ActiveSession, ActiveSessionsFilter, AttrProcessEventReply, AuthorizeArgs,
    AuthorizeReply, AuthorizeReplyWithDigest, CacheResourceLimitsArgs, CdrFilter, Cdr, CgrEvent,
    DisconnectSessionArgs, InitSessionArgs, InitSessionReply, InitSessionReplyWithDigest,
    ProcessEventArgs, ProcessEventReply, Session, SessionRun, TerminateSessionArgs,
    UpdateSessionArgs, UpdateSessionReply, max_usage_nanos,
};
use crate::services::{
    bounded, AdmissionOutcome, Allocation, CdrGenerator, PendingSlot, ResourceLimiterService,
    SessionTable,
};
use crate::traits::{AttributeService, RatingService, SessionNotifier, SupplierService};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn, error, debug};

pub const TTL_DISCONNECT_REASON: &str = "SESSION_TTL_EXPIRED";

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Bound for collaborator calls when the request carries no `TimeoutMs`
    pub collaborator_timeout: Duration,
    /// Usage requested from rating when the event carries none
    pub max_call_duration: Duration,
    /// Idle horizon after which sessions are force-terminated; `None` disables the sweeper
    pub session_ttl: Option<Duration>,
    pub ttl_check_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(2),
            max_call_duration: Duration::from_secs(3 * 3600),
            session_ttl: None,
            ttl_check_interval: Duration::from_secs(60),
        }
    }
}

/// Session state machine: authorize, initiate, update, terminate and one-shot events
pub struct SessionManager {
    limiter: Arc<ResourceLimiterService>,
    sessions: SessionTable,
    rating: Arc<dyn RatingService>,
    attributes: Arc<dyn AttributeService>,
    suppliers: Arc<dyn SupplierService>,
    notifier: Option<Arc<dyn SessionNotifier>>,
    cdrs: CdrGenerator,
    config: SessionManagerConfig,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        limiter: Arc<ResourceLimiterService>,
        rating: Arc<dyn RatingService>,
        attributes: Arc<dyn AttributeService>,
        suppliers: Arc<dyn SupplierService>,
        notifier: Option<Arc<dyn SessionNotifier>>,
        cdrs: CdrGenerator,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            limiter,
            sessions: SessionTable::new(),
            rating,
            attributes,
            suppliers,
            notifier,
            cdrs,
            config,
        }
    }

    pub fn limiter(&self) -> &Arc<ResourceLimiterService> {
        &self.limiter
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    fn timeout(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.collaborator_timeout)
    }

    fn requested_usage(&self, event: &CgrEvent) -> Result<Duration, EngineError> {
        Ok(event.usage()?.unwrap_or(self.config.max_call_duration))
    }

    /// Runs the event through AttributeS and continues with the altered copy
    async fn process_attributes(
        &self,
        event: &mut CgrEvent,
        timeout: Duration,
    ) -> Result<AttrProcessEventReply, EngineError> {
        let mut request = event.clone();
        request.context = Some(SESSIONS_CONTEXT.to_string());
        request
            .event
            .insert(fields::CGRID.to_string(), event.cgr_id().into());

        let reply = bounded("attributes", timeout, self.attributes.process_event(&request)).await?;
        *event = reply.cgr_event.clone();
        Ok(reply)
    }

    // ==================== AUTHORIZE ====================

    /// Never creates or mutates sessions; resource admission is provisional
    pub async fn authorize(&self, args: AuthorizeArgs) -> Result<AuthorizeReply, EngineError> {
        let timeout = self.timeout(args.timeout_ms);
        let mut event = args.cgr_event;
        let mut reply = AuthorizeReply::default();

        info!("🔐 Authorize: event={}", event.id);

        if args.get_attributes {
            reply.attributes = Some(self.process_attributes(&mut event, timeout).await?);
        }

        if args.get_max_usage {
            let requested = self.requested_usage(&event)?;
            let granted = bounded("rating", timeout, self.rating.max_usage(&event, requested)).await?;
            reply.max_usage = max_usage_nanos(granted);
        }

        if args.get_suppliers {
            reply.suppliers =
                Some(bounded("suppliers", timeout, self.suppliers.sorted_suppliers(&event)).await?);
        }

        if args.authorize_resources {
            match self.limiter.authorize(&event, Utc::now()) {
                AdmissionOutcome::Granted { limit_id, .. } => reply.resource_allocation = Some(limit_id),
                AdmissionOutcome::Denied { limit_id } => reply.resource_denied = Some(limit_id),
                AdmissionOutcome::Unconstrained => {}
            }
        }

        debug!("Authorize reply: {:?}", reply);
        Ok(reply)
    }

    pub async fn authorize_with_digest(
        &self,
        args: AuthorizeArgs,
    ) -> Result<AuthorizeReplyWithDigest, EngineError> {
        self.authorize(args).await.map(Into::into)
    }

    // ==================== INITIATE ====================

    /// Inserts a primary and a digest run for the origin. A repeated call on an origin that
    /// still holds its slot reuses it instead of reserving again. Without `InitSession` the
    /// slot is kept as an allocation-only entry that Terminate can release.
    pub async fn initiate(&self, args: InitSessionArgs) -> Result<InitSessionReply, EngineError> {
        let timeout = self.timeout(args.timeout_ms);
        let mut event = args.cgr_event;
        let origin_id = event.origin_id()?;
        let _guard = self.sessions.lock(&origin_id).await;
        let mut reply = InitSessionReply::default();

        info!("📞 Initiate: origin={}", origin_id);

        if args.get_attributes {
            reply.attributes = Some(self.process_attributes(&mut event, timeout).await?);
        }

        let mut runs = None;
        if args.init_session {
            let requested = self.requested_usage(&event)?;
            let granted = bounded("rating", timeout, self.rating.max_usage(&event, requested)).await?;
            reply.max_usage = max_usage_nanos(granted);
            runs = Some(self.new_runs(&origin_id, &event, granted)?);
        }

        // From here on nothing suspends or fails: a reserved slot always ends up tracked
        let now = Utc::now();
        let mut held: Option<Allocation> = None;
        if args.allocate_resources {
            match self.current_allocation(&origin_id, now) {
                Some(allocation) => {
                    debug!("Origin {} reuses allocation {}", origin_id, allocation.limit_id);
                    held = Some(allocation);
                }
                None => match self.limiter.allocate(&event, now)? {
                    AdmissionOutcome::Granted { limit_id, slot } => {
                        held = slot.map(|slot| Allocation { limit_id, slot });
                    }
                    AdmissionOutcome::Denied { limit_id } => {
                        warn!("⛔ Initiate denied: origin={}, resource={}", origin_id, limit_id);
                        reply.max_usage = max_usage_nanos(Duration::ZERO);
                        reply.resource_denied = Some(limit_id);
                        return Ok(reply);
                    }
                    AdmissionOutcome::Unconstrained => {}
                },
            }
        }
        reply.resource_allocation = held.as_ref().map(|a| a.limit_id.clone());

        match runs {
            Some(runs) => {
                if held.is_some() {
                    // The runs now carry the slot
                    self.sessions.take_held(&origin_id);
                }
                for mut session in runs {
                    if let Some(allocation) = &held {
                        session.resource_allocation = Some(allocation.limit_id.clone());
                        session.reservation_ts = Some(allocation.slot);
                    }
                    self.sessions.insert(session);
                }
                info!(
                    "✅ Session initiated: origin={}, max_usage={:?}, allocation={:?}, active={}",
                    origin_id,
                    reply.max_usage,
                    reply.resource_allocation,
                    self.sessions.len()
                );
            }
            None => {
                if let Some(allocation) = held {
                    info!("📌 Allocation held for {}: {}", origin_id, allocation.limit_id);
                    self.sessions.hold(&origin_id, allocation);
                }
            }
        }

        Ok(reply)
    }

    /// The slot this origin already holds, from its runs or an allocation-only entry.
    /// Records pointing at a released or expired slot are cleared.
    fn current_allocation(&self, origin_id: &str, now: DateTime<Utc>) -> Option<Allocation> {
        let from_runs = self.sessions.get(origin_id).and_then(|runs| {
            runs.into_iter().find_map(|s| {
                Some(Allocation {
                    limit_id: s.resource_allocation?,
                    slot: s.reservation_ts?,
                })
            })
        });
        let allocation = from_runs.or_else(|| self.sessions.held(origin_id))?;

        if self.limiter.holds(&allocation.limit_id, allocation.slot, now) {
            return Some(allocation);
        }

        debug!("Allocation {} of {} no longer held", allocation.limit_id, origin_id);
        self.forget_allocation(origin_id);
        None
    }

    fn forget_allocation(&self, origin_id: &str) {
        self.sessions.take_held(origin_id);
        self.sessions.update(origin_id, |s| {
            s.resource_allocation = None;
            s.reservation_ts = None;
        });
    }

    pub async fn initiate_with_digest(
        &self,
        args: InitSessionArgs,
    ) -> Result<InitSessionReplyWithDigest, EngineError> {
        self.initiate(args).await.map(Into::into)
    }

    fn new_runs(
        &self,
        origin_id: &str,
        event: &CgrEvent,
        max_usage: Duration,
    ) -> Result<Vec<Session>, EngineError> {
        let now = Utc::now();
        let setup_time = event.field_as_time(fields::SETUP_TIME)?;
        let answer_time = event.field_as_time(fields::ANSWER_TIME)?;
        let cgr_id = event.cgr_id();

        Ok(SessionRun::ALL
            .iter()
            .map(|run| Session {
                origin_id: origin_id.to_string(),
                cgr_id: cgr_id.clone(),
                tenant: event.tenant.clone(),
                run: *run,
                event: event.clone(),
                resource_allocation: None,
                reservation_ts: None,
                max_usage,
                total_usage: Duration::ZERO,
                setup_time,
                answer_time,
                created_at: now,
                last_update: now,
            })
            .collect())
    }

    // ==================== UPDATE ====================

    pub async fn update(&self, args: UpdateSessionArgs) -> Result<UpdateSessionReply, EngineError> {
        let timeout = self.timeout(args.timeout_ms);
        let mut event = args.cgr_event;
        let origin_id = event.origin_id()?;
        let _guard = self.sessions.lock(&origin_id).await;

        // A terminate that won the lock leaves nothing to update
        if !self.sessions.contains(&origin_id) {
            return Err(EngineError::NotFound(format!("session {}", origin_id)));
        }

        let mut reply = UpdateSessionReply::default();

        if args.get_attributes {
            reply.attributes = Some(self.process_attributes(&mut event, timeout).await?);
        }

        if args.update_session {
            let requested = self.requested_usage(&event)?;
            let granted = bounded("rating", timeout, self.rating.max_usage(&event, requested)).await?;
            let answer_time = event.field_as_time(fields::ANSWER_TIME)?;
            let now = Utc::now();

            self.sessions
                .update(&origin_id, |s| {
                    s.max_usage = granted;
                    s.total_usage += granted;
                    if answer_time.is_some() {
                        s.answer_time = answer_time;
                    }
                    s.last_update = now;
                })
                .ok_or_else(|| EngineError::NotFound(format!("session {}", origin_id)))?;

            reply.max_usage = max_usage_nanos(granted);
            info!("🔄 Session updated: origin={}, max_usage={:?}", origin_id, granted);
        }

        Ok(reply)
    }

    // ==================== TERMINATE ====================

    pub async fn terminate(&self, args: TerminateSessionArgs) -> Result<(), EngineError> {
        let timeout = self.timeout(args.timeout_ms);
        let event = args.cgr_event;
        let origin_id = event.origin_id()?;
        let _guard = self.sessions.lock(&origin_id).await;

        if !self.sessions.contains(&origin_id) {
            return self.release_held(&origin_id, args.release_resources);
        }

        // Final debit happens while the session is still tracked, so a failure leaves it intact
        if args.terminate_session {
            if let Some(usage) = event.usage()? {
                let debited = bounded("rating", timeout, self.rating.debit(&event, usage)).await?;
                debug!("Final debit for {}: {:?}", origin_id, debited);
            }
        }

        let runs = if args.terminate_session {
            self.sessions.remove(&origin_id)
        } else {
            self.sessions.get(&origin_id)
        };
        let runs = runs.ok_or_else(|| EngineError::NotFound(format!("session {}", origin_id)))?;

        if args.release_resources {
            self.release_runs(&runs);
            if let Some(allocation) = self.sessions.take_held(&origin_id) {
                self.limiter.release(&allocation.limit_id, allocation.slot);
            }
            if !args.terminate_session {
                self.forget_allocation(&origin_id);
            }
        }

        info!(
            "🏁 Session terminated: origin={}, runs={}, active={}",
            origin_id,
            runs.len(),
            self.sessions.len()
        );
        Ok(())
    }

    /// Terminate on an origin without runs: only an allocation-only slot can be released
    fn release_held(&self, origin_id: &str, release: bool) -> Result<(), EngineError> {
        let allocation = release
            .then(|| self.sessions.take_held(origin_id))
            .flatten()
            .ok_or_else(|| EngineError::NotFound(format!("session {}", origin_id)))?;

        self.limiter.release(&allocation.limit_id, allocation.slot);
        info!("🔓 Allocation of {} released on {}", origin_id, allocation.limit_id);
        Ok(())
    }

    /// Runs of one origin share their slot; release each held slot once
    fn release_runs(&self, runs: &[Session]) {
        let held: HashSet<Allocation> = runs
            .iter()
            .filter_map(|s| {
                Some(Allocation {
                    limit_id: s.resource_allocation.clone()?,
                    slot: s.reservation_ts?,
                })
            })
            .collect();

        for allocation in held {
            self.limiter.release(&allocation.limit_id, allocation.slot);
        }
    }

    // ==================== ONE-SHOT EVENTS ====================

    /// Debit, attributes and resource allocation without tracking a session.
    ///
    /// Admission comes before the debit, so a denied event is never charged. A granted slot is
    /// returned if the debit does not complete, otherwise it expires with the usage horizon.
    pub async fn process_event(&self, args: ProcessEventArgs) -> Result<ProcessEventReply, EngineError> {
        let timeout = self.timeout(args.timeout_ms);
        let mut event = args.cgr_event;
        let mut reply = ProcessEventReply::default();

        info!("⚡ ProcessEvent: event={}", event.id);

        if args.get_attributes {
            reply.attributes = Some(self.process_attributes(&mut event, timeout).await?);
        }
        let usage = args.debit.then(|| self.requested_usage(&event)).transpose()?;

        let mut outcome = AdmissionOutcome::Unconstrained;
        if args.allocate_resources {
            outcome = self.limiter.allocate(&event, Utc::now())?;
            if let Some(limit_id) = outcome.denied() {
                warn!("⛔ ProcessEvent denied: event={}, resource={}", event.id, limit_id);
                reply.max_usage = max_usage_nanos(Duration::ZERO);
                reply.resource_denied = Some(limit_id.to_string());
                return Ok(reply);
            }
            reply.resource_allocation = outcome.allocation().map(str::to_string);
        }
        let pending = PendingSlot::new(&self.limiter, &outcome);

        if let Some(usage) = usage {
            let debited = bounded("rating", timeout, self.rating.debit(&event, usage)).await?;
            reply.max_usage = max_usage_nanos(debited);
        }

        pending.commit();
        Ok(reply)
    }

    pub fn process_cdr(&self, event: CgrEvent) -> Result<(), EngineError> {
        self.cdrs.process_cdr(event)
    }

    // ==================== QUERIES ====================

    pub fn get_active_sessions(
        &self,
        filter: &ActiveSessionsFilter,
    ) -> Result<Vec<ActiveSession>, EngineError> {
        let active = self.sessions.snapshot(filter);
        if active.is_empty() {
            return Err(EngineError::NotFound("active sessions".to_string()));
        }
        Ok(active)
    }

    pub async fn get_cdrs(&self, filter: &CdrFilter) -> Result<Vec<Cdr>, EngineError> {
        self.cdrs.get_cdrs(filter).await
    }

    pub async fn count_cdrs(&self, filter: &CdrFilter) -> Result<i64, EngineError> {
        self.cdrs.count_cdrs(filter).await
    }

    pub async fn cache_resource_limits(&self, args: CacheResourceLimitsArgs) -> Result<(), EngineError> {
        self.limiter
            .cache_resource_limits(&args.load_id, args.resource_limit_ids.as_deref())
            .await
    }

    // ==================== TTL SWEEPER ====================

    /// Starts the idle-session sweeper when a TTL is configured
    pub fn spawn_ttl_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.config.session_ttl?;
        let manager = Arc::clone(self);
        let period = self.config.ttl_check_interval;

        info!("⏱️ Session TTL sweeper every {:?}, ttl {:?}", period, ttl);

        Some(tokio::spawn(async move {
            let mut check_interval = interval(period);
            loop {
                check_interval.tick().await;
                let swept = manager.sweep_idle(Utc::now(), ttl).await;
                if swept > 0 {
                    info!("🧹 Swept {} idle sessions", swept);
                }
            }
        }))
    }

    /// Terminates sessions idle for longer than `ttl` and asks the agent to hang them up
    pub async fn sweep_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let mut swept = 0;

        let expired = self
            .sessions
            .retain_held(|a| self.limiter.holds(&a.limit_id, a.slot, now));
        if expired > 0 {
            debug!("Dropped {} expired allocation-only entries", expired);
        }

        for origin_id in self.sessions.idle_since(now - ttl) {
            let runs = {
                let _guard = self.sessions.lock(&origin_id).await;
                // Re-check under the lock: an update may have refreshed it
                match self.sessions.get(&origin_id) {
                    Some(runs) if runs.iter().all(|s| s.last_update < now - ttl) => {
                        self.sessions.remove(&origin_id)
                    }
                    _ => None,
                }
            };
            let Some(runs) = runs else { continue };

            self.release_runs(&runs);
            swept += 1;
            warn!("⏱️ Session {} idle beyond {:?}, terminated", origin_id, ttl);

            let Some(notifier) = &self.notifier else {
                continue;
            };
            let Some(primary) = runs.iter().find(|s| s.run == SessionRun::Primary) else {
                continue;
            };
            let args = DisconnectSessionArgs {
                event_start: primary.event.clone(),
                reason: TTL_DISCONNECT_REASON.to_string(),
            };
            match bounded(
                "agent",
                self.config.collaborator_timeout,
                notifier.disconnect_session(&args),
            )
            .await
            {
                Ok(reply) => debug!("Agent acknowledged disconnect of {}: {}", origin_id, reply),
                Err(e) => error!("❌ Disconnect of {} failed: {}", origin_id, e),
            }
        }

        swept
    }
}
