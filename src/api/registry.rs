// src/api/registry.rs
//! Explicit JSON-RPC method table: name -> typed handler

use futures::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{
    ActiveSessionsFilter, AuthorizeArgs, CacheResourceLimitsArgs, CdrFilter, CgrEvent,
    InitSessionArgs, ProcessEventArgs, TerminateSessionArgs, UpdateSessionArgs, OK, PONG,
};
use crate::services::SessionManager;

pub type HandlerFuture = BoxFuture<'static, Result<Value, EngineError>>;
pub type Handler = Box<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Methods the server refuses to start without
pub const REQUIRED_METHODS: &[&str] = &[
    "SessionSv1.Ping",
    "SessionSv1.AuthorizeEvent",
    "SessionSv1.AuthorizeEventWithDigest",
    "SessionSv1.InitiateSession",
    "SessionSv1.InitiateSessionWithDigest",
    "SessionSv1.UpdateSession",
    "SessionSv1.TerminateSession",
    "SessionSv1.ProcessCDR",
    "SessionSv1.ProcessEvent",
    "SessionSv1.GetActiveSessions",
    "ResourceLimiterSv1.CacheResourceLimits",
    "CdrsV1.GetCDRs",
    "CdrsV1.CountCDRs",
];

#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler; params are decoded into `A` before the call
    pub fn register<A, R, F, Fut>(&mut self, method: &'static str, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, EngineError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.handlers.insert(
            method,
            Box::new(move |params: Value| {
                let handler = Arc::clone(&handler);
                async move {
                    let args: A = serde_json::from_value(params)
                        .map_err(|e| EngineError::InvalidRequest(format!("{}: {}", method, e)))?;
                    let reply = (*handler)(args).await?;
                    Ok(serde_json::to_value(reply)?)
                }
                .boxed()
            }),
        );
    }

    /// Full SessionSv1 / ResourceLimiterSv1 / CdrsV1 surface
    pub fn for_sessions(manager: Arc<SessionManager>) -> Self {
        let mut registry = Self::new();

        registry.register("SessionSv1.Ping", |_: Value| async { Ok::<_, EngineError>(PONG) });

        let sm = manager.clone();
        registry.register("SessionSv1.AuthorizeEvent", move |args: AuthorizeArgs| {
            let sm = sm.clone();
            async move { sm.authorize(args).await }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.AuthorizeEventWithDigest", move |args: AuthorizeArgs| {
            let sm = sm.clone();
            async move { sm.authorize_with_digest(args).await }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.InitiateSession", move |args: InitSessionArgs| {
            let sm = sm.clone();
            async move { sm.initiate(args).await }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.InitiateSessionWithDigest", move |args: InitSessionArgs| {
            let sm = sm.clone();
            async move { sm.initiate_with_digest(args).await }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.UpdateSession", move |args: UpdateSessionArgs| {
            let sm = sm.clone();
            async move { sm.update(args).await }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.TerminateSession", move |args: TerminateSessionArgs| {
            let sm = sm.clone();
            async move { sm.terminate(args).await.map(|_| OK) }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.ProcessCDR", move |event: CgrEvent| {
            let sm = sm.clone();
            async move { sm.process_cdr(event).map(|_| OK) }
        });

        let sm = manager.clone();
        registry.register("SessionSv1.ProcessEvent", move |args: ProcessEventArgs| {
            let sm = sm.clone();
            async move { sm.process_event(args).await }
        });

        let sm = manager.clone();
        registry.register(
            "SessionSv1.GetActiveSessions",
            move |filter: Option<ActiveSessionsFilter>| {
                let sm = sm.clone();
                async move { sm.get_active_sessions(&filter.unwrap_or_default()) }
            },
        );

        let sm = manager.clone();
        registry.register(
            "ResourceLimiterSv1.CacheResourceLimits",
            move |args: CacheResourceLimitsArgs| {
                let sm = sm.clone();
                async move { sm.cache_resource_limits(args).await.map(|_| OK) }
            },
        );

        let sm = manager.clone();
        registry.register("CdrsV1.GetCDRs", move |filter: Option<CdrFilter>| {
            let sm = sm.clone();
            async move { sm.get_cdrs(&filter.unwrap_or_default()).await }
        });

        let sm = manager;
        registry.register("CdrsV1.CountCDRs", move |filter: Option<CdrFilter>| {
            let sm = sm.clone();
            async move { sm.count_cdrs(&filter.unwrap_or_default()).await }
        });

        registry
    }

    /// Fails when any required method has no handler
    pub fn verify(&self) -> Result<(), EngineError> {
        let missing: Vec<&str> = REQUIRED_METHODS
            .iter()
            .copied()
            .filter(|m| !self.handlers.contains_key(*m))
            .collect();

        if !missing.is_empty() {
            return Err(EngineError::Internal(format!(
                "unregistered RPC methods: {}",
                missing.join(", ")
            )));
        }

        info!("✅ {} RPC methods registered", self.handlers.len());
        Ok(())
    }

    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        let well_formed = method
            .split_once('.')
            .map_or(false, |(service, name)| !service.is_empty() && !name.is_empty());
        if !well_formed {
            return Err(EngineError::NotImplemented(method.to_string()));
        }

        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| EngineError::NotImplemented(method.to_string()))?;

        debug!("Dispatching {}", method);
        handler(params).await
    }

    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<&'static str> = self.handlers.keys().copied().collect();
        methods.sort_unstable();
        methods
    }
}
