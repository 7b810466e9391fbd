use std::sync::Arc;

use chrono::Utc;
use restock_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink};
use restock_core::cache::{CacheNamespace, CacheScope, PlanCache, StoreOutcome};
use restock_core::calendar::{Clock, ContextDeriver, SystemClock};
use restock_core::canonical::Canonicalizer;
use restock_core::config::AppConfig;
use restock_core::domain::calendar::CalendarContext;
use restock_core::domain::plan::{
    CachedPlan, CallerId, Fingerprint, InputsEcho, PlanOrigin, ProcurementPlan,
};
use restock_core::errors::PlanError;
use restock_core::flows::{FlowEngine, PlanRun, PlanRunFlow, RunEvent, TransitionOutcome};
use restock_core::policy::{EnvelopeBuilder, PolicyTable};
use restock_core::validation::ResponseValidator;
use serde::Serialize;
use uuid::Uuid;

use crate::llm::{GatewayRequest, ReasoningGateway};

const ACTOR: &str = "plan-orchestrator";

/// Terminal `Done` result of one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    pub origin: PlanOrigin,
    pub fingerprint: Fingerprint,
    pub plan: ProcurementPlan,
    pub correlation_id: String,
    pub calendar_context: CalendarContext,
    /// `None` on cache hits and when the write failed.
    pub cache_write: Option<StoreOutcome>,
    #[serde(skip)]
    pub transitions: Vec<TransitionOutcome>,
}

pub struct PlanOrchestrator {
    clock: Arc<dyn Clock>,
    deriver: ContextDeriver,
    canonicalizer: Canonicalizer,
    envelope: EnvelopeBuilder,
    validator: ResponseValidator,
    gateway: Arc<dyn ReasoningGateway>,
    cache: Arc<dyn PlanCache>,
    audit: Arc<dyn AuditSink>,
    cache_scope: CacheScope,
    flow: FlowEngine<PlanRunFlow>,
}

impl PlanOrchestrator {
    pub fn new(gateway: Arc<dyn ReasoningGateway>, cache: Arc<dyn PlanCache>) -> Self {
        Self {
            clock: Arc::new(SystemClock::default()),
            deriver: ContextDeriver::default(),
            canonicalizer: Canonicalizer::default(),
            envelope: EnvelopeBuilder::default(),
            validator: ResponseValidator::default(),
            gateway,
            cache,
            audit: Arc::new(TracingAuditSink),
            cache_scope: CacheScope::default(),
            flow: FlowEngine::default(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        gateway: Arc<dyn ReasoningGateway>,
        cache: Arc<dyn PlanCache>,
    ) -> Self {
        Self::new(gateway, cache)
            .with_clock(Arc::new(SystemClock::from_offset_minutes(
                config.calendar.utc_offset_minutes,
            )))
            .with_context_deriver(ContextDeriver::new(config.calendar.events.clone()))
            .with_canonicalizer(Canonicalizer::new(config.planning.min_inventory_chars))
            .with_cache_scope(config.planning.cache_scope)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_context_deriver(mut self, deriver: ContextDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Envelope and validator always share one table.
    pub fn with_policy_table(mut self, table: PolicyTable) -> Self {
        self.envelope = EnvelopeBuilder::new(table.clone());
        self.validator = ResponseValidator::new(table);
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cache_scope(mut self, cache_scope: CacheScope) -> Self {
        self.cache_scope = cache_scope;
        self
    }

    pub fn policy_table(&self) -> &PolicyTable {
        self.envelope.table()
    }

    pub async fn produce_plan(
        &self,
        caller: &CallerId,
        inventory_text: &str,
        instruction_text: &str,
        horizon_days: u32,
    ) -> Result<PlanOutcome, PlanError> {
        let correlation_id = Uuid::new_v4().to_string();
        self.produce_plan_with_correlation(
            caller,
            inventory_text,
            instruction_text,
            horizon_days,
            &correlation_id,
        )
        .await
    }

    pub async fn produce_plan_with_correlation(
        &self,
        caller: &CallerId,
        inventory_text: &str,
        instruction_text: &str,
        horizon_days: u32,
        correlation_id: &str,
    ) -> Result<PlanOutcome, PlanError> {
        let mut audit = AuditContext::new(Some(caller.clone()), None, correlation_id, ACTOR);
        let mut run = PlanRun::start(&self.flow);
        self.advance(&mut run, RunEvent::Begin, &audit);

        let context = self.deriver.derive(self.clock.now(), horizon_days);
        let (request, fingerprint) = match self.canonicalizer.canonicalize(
            inventory_text,
            instruction_text,
            context,
            horizon_days,
        ) {
            Ok(canonical) => canonical,
            Err(error) => return Err(self.fail(&mut run, RunEvent::InvalidInput, &audit, error)),
        };
        audit = audit.with_fingerprint(fingerprint.clone());
        self.advance(&mut run, RunEvent::InputAccepted, &audit);

        let namespace = self.cache_scope.namespace(caller);
        let cached = match self.cache.lookup(&namespace, &fingerprint).await {
            Ok(cached) => cached,
            Err(error) => {
                let error = PlanError::Cache(error.to_string());
                return Err(self.fail(&mut run, RunEvent::CacheUnavailable, &audit, error));
            }
        };

        if let Some(cached) = cached {
            self.advance(&mut run, RunEvent::CacheHit, &audit);
            tracing::info!(
                event_name = "plan.cache_hit",
                correlation_id = %correlation_id,
                caller_id = %caller.0,
                fingerprint = %fingerprint.short(),
                "returning cached plan"
            );
            self.audit.emit(
                audit
                    .event("plan.cache_hit", AuditCategory::Cache, AuditOutcome::Success)
                    .with_metadata("cached_at", cached.created_at.to_rfc3339()),
            );
            return Ok(PlanOutcome {
                origin: PlanOrigin::Cache,
                fingerprint,
                plan: cached.response_body,
                correlation_id: correlation_id.to_string(),
                calendar_context: request.calendar_context,
                cache_write: None,
                transitions: run.into_history(),
            });
        }
        self.advance(&mut run, RunEvent::CacheMiss, &audit);

        let envelope = self.envelope.build(&request.calendar_context);
        let gateway_request = GatewayRequest {
            system_instruction: envelope.system_instruction,
            context_annex: envelope.context_annex,
            user_prompt: request.render_prompt(),
            tool: envelope.tool,
        };

        tracing::info!(
            event_name = "plan.engine_invoked",
            correlation_id = %correlation_id,
            caller_id = %caller.0,
            fingerprint = %fingerprint.short(),
            gateway = self.gateway.name(),
            horizon_days,
            "invoking reasoning engine"
        );
        self.audit.emit(
            audit
                .event("plan.engine_invoked", AuditCategory::Engine, AuditOutcome::Success)
                .with_metadata("gateway", self.gateway.name()),
        );

        let invocation = match self.gateway.submit(&gateway_request).await {
            Ok(invocation) => invocation,
            Err(error) => {
                return Err(self.fail(&mut run, RunEvent::GatewayError, &audit, error.into()))
            }
        };
        self.advance(&mut run, RunEvent::StructuredReceived, &audit);

        let plan = match self.validator.validate(&invocation.arguments, &request) {
            Ok(plan) => plan,
            Err(error) => return Err(self.fail(&mut run, RunEvent::Invalid, &audit, error)),
        };
        self.advance(&mut run, RunEvent::Valid, &audit);
        self.audit.emit(
            audit
                .event("plan.accepted", AuditCategory::Validation, AuditOutcome::Success)
                .with_metadata("status", format!("{:?}", plan.status()))
                .with_metadata("items", plan.items().len().to_string()),
        );

        let entry = CachedPlan {
            fingerprint: fingerprint.clone(),
            response_body: plan.clone(),
            created_at: self.clock.now().with_timezone(&Utc),
            inputs_echo: InputsEcho {
                instruction_text: request.instruction_text.clone(),
                calendar_context: request.calendar_context.clone(),
            },
        };
        let cache_write = self.store(&namespace, &entry, &audit).await;
        self.advance(&mut run, RunEvent::Cached, &audit);

        Ok(PlanOutcome {
            origin: PlanOrigin::Fresh,
            fingerprint,
            plan,
            correlation_id: correlation_id.to_string(),
            calendar_context: request.calendar_context,
            cache_write,
            transitions: run.into_history(),
        })
    }

    async fn store(
        &self,
        namespace: &CacheNamespace,
        entry: &CachedPlan,
        audit: &AuditContext,
    ) -> Option<StoreOutcome> {
        match self.cache.store(namespace, entry).await {
            Ok(StoreOutcome::AlreadyExistsButDiffers) => {
                tracing::warn!(
                    event_name = "plan.cache_divergence",
                    correlation_id = %audit.correlation_id,
                    fingerprint = %entry.fingerprint.short(),
                    "a different plan is already cached for this fingerprint; keeping the first"
                );
                self.audit.emit(audit.event(
                    "plan.cache_divergence",
                    AuditCategory::Cache,
                    AuditOutcome::Rejected,
                ));
                Some(StoreOutcome::AlreadyExistsButDiffers)
            }
            Ok(outcome) => {
                self.audit.emit(
                    audit
                        .event("plan.cache_write", AuditCategory::Cache, AuditOutcome::Success)
                        .with_metadata("outcome", format!("{outcome:?}")),
                );
                Some(outcome)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "plan.cache_write_failed",
                    correlation_id = %audit.correlation_id,
                    fingerprint = %entry.fingerprint.short(),
                    error = %error,
                    "plan cache write failed; returning the validated plan uncached"
                );
                self.audit.emit(
                    audit
                        .event("plan.cache_write_failed", AuditCategory::Cache, AuditOutcome::Failed)
                        .with_metadata("error", error.to_string()),
                );
                None
            }
        }
    }

    fn advance(&self, run: &mut PlanRun<'_, PlanRunFlow>, event: RunEvent, audit: &AuditContext) {
        if let Err(error) = run.advance(event, self.audit.as_ref(), audit) {
            tracing::error!(
                event_name = "plan.flow_violation",
                correlation_id = %audit.correlation_id,
                error = %error,
                "plan run left its state machine"
            );
        }
    }

    fn fail(
        &self,
        run: &mut PlanRun<'_, PlanRunFlow>,
        event: RunEvent,
        audit: &AuditContext,
        error: PlanError,
    ) -> PlanError {
        self.advance(run, event, audit);
        tracing::warn!(
            event_name = "plan.failed",
            correlation_id = %audit.correlation_id,
            error_class = error.class(),
            error = %error,
            "plan run failed"
        );
        self.audit.emit(
            audit
                .event("plan.failed", AuditCategory::Flow, AuditOutcome::Failed)
                .with_metadata("error_class", error.class())
                .with_metadata("error", error.to_string()),
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};
    use restock_core::audit::InMemoryAuditSink;
    use restock_core::cache::{CacheError, CacheNamespace, CacheScope, PlanCache, StoreOutcome};
    use restock_core::calendar::FixedClock;
    use restock_core::domain::plan::{
        CachedPlan, CallerId, Fingerprint, PlanOrigin, PlanStatus, RiskLevel,
    };
    use restock_core::errors::{PlanError, ValidationCheck};
    use restock_core::flows::RunState;
    use restock_core::policy::{PolicyId, PolicyTable};
    use restock_db::InMemoryPlanCache;
    use serde_json::{json, Value};

    use super::PlanOrchestrator;
    use crate::llm::{GatewayError, GatewayRequest, ReasoningGateway, StructuredInvocation};

    const INVENTORY: &str = "name,currentStock,unit,avgDailyUsage,marketPrice\n\
                             Paneer,2,kg,3,380\n\
                             Oil,0.5,liters,5,150";

    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<Value, GatewayError>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<GatewayRequest>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<Value, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> Option<GatewayRequest> {
            self.requests.lock().expect("requests lock").last().cloned()
        }
    }

    #[async_trait]
    impl ReasoningGateway for ScriptedGateway {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn submit(
            &self,
            request: &GatewayRequest,
        ) -> Result<StructuredInvocation, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().expect("requests lock").push(request.clone());
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Transport("script exhausted".to_owned())));
            reply.map(|arguments| StructuredInvocation {
                tool_name: request.tool.name.clone(),
                arguments,
            })
        }
    }

    struct BrokenCache {
        fail_reads: bool,
    }

    #[async_trait]
    impl PlanCache for BrokenCache {
        async fn lookup(
            &self,
            _namespace: &CacheNamespace,
            _fingerprint: &Fingerprint,
        ) -> Result<Option<CachedPlan>, CacheError> {
            if self.fail_reads {
                Err(CacheError::Backend("database is locked".to_owned()))
            } else {
                Ok(None)
            }
        }

        async fn store(
            &self,
            _namespace: &CacheNamespace,
            _plan: &CachedPlan,
        ) -> Result<StoreOutcome, CacheError> {
            Err(CacheError::Backend("disk full".to_owned()))
        }
    }

    /// 2026-10-17 is a Saturday, 2026-10-20 a Tuesday.
    fn clock(day: u32) -> Arc<FixedClock> {
        let now = FixedOffset::east_opt(0)
            .and_then(|offset| offset.with_ymd_and_hms(2026, 10, day, 9, 0, 0).single())
            .expect("timestamp");
        Arc::new(FixedClock(now))
    }

    fn weekend_plan() -> Value {
        json!({
            "status": "SUCCESS",
            "summary": "Weekend top-up with an urgent oil order",
            "totalCost": 2640,
            "items": [
                {
                    "itemName": "Paneer",
                    "currentStock": 2,
                    "recommendedOrder": 3,
                    "unit": "kg",
                    "unitPrice": 380,
                    "estimatedCost": 1140,
                    "riskLevel": "Low",
                    "appliedPolicy": "WEEKEND_RUSH",
                    "reasoning": "Saturday demand at 1.4x"
                },
                {
                    "itemName": "Oil",
                    "currentStock": 0.5,
                    "recommendedOrder": 10,
                    "unit": "liters",
                    "unitPrice": 150,
                    "estimatedCost": 1500,
                    "riskLevel": "High",
                    "appliedPolicy": "LOW_STOCK_CRITICAL",
                    "reasoning": "Stock covers a tenth of one day"
                }
            ]
        })
    }

    fn orchestrator(
        gateway: Arc<ScriptedGateway>,
        cache: Arc<dyn PlanCache>,
        day: u32,
    ) -> (PlanOrchestrator, InMemoryAuditSink) {
        let sink = InMemoryAuditSink::default();
        let orchestrator = PlanOrchestrator::new(gateway, cache)
            .with_clock(clock(day))
            .with_audit_sink(Arc::new(sink.clone()));
        (orchestrator, sink)
    }

    fn caller(id: &str) -> CallerId {
        CallerId(id.to_owned())
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);

        let first = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "prep for the weekend", 3)
            .await
            .expect("fresh plan");
        let second = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "prep for the weekend", 3)
            .await
            .expect("cached plan");

        assert_eq!(first.origin, PlanOrigin::Fresh);
        assert_eq!(first.cache_write, Some(StoreOutcome::Stored));
        assert_eq!(second.origin, PlanOrigin::Cache);
        assert_eq!(second.plan, first.plan);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(first.transitions.last().map(|step| step.to), Some(RunState::Done));
        assert_eq!(second.transitions.len(), 3);
        assert!(sink.event_types().contains(&"plan.cache_hit".to_owned()));
    }

    #[tokio::test]
    async fn weekend_plan_carries_policies_and_low_stock_risk() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, _sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);

        let outcome = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect("fresh plan");

        let items = outcome.plan.items();
        assert_eq!(items[0].applied_policy, PolicyId::WeekendRush);
        assert_eq!(items[1].applied_policy, PolicyId::LowStockCritical);
        assert!(items[1].risk_level.is_elevated());
        assert!(outcome.calendar_context.is_weekend);

        let request = gateway.last_request().expect("engine was called");
        assert_eq!(request.context_annex["weekendRushWindow"], true);
        assert!(request.user_prompt.contains("Oil, 0.5, liters, 5, 150"));
    }

    #[tokio::test]
    async fn empty_inventory_fails_without_engine_call() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);

        let error = orchestrator
            .produce_plan(&caller("kitchen-7"), "", "anything", 3)
            .await
            .expect_err("empty inventory");

        assert!(matches!(error, PlanError::InvalidInput(_)));
        assert!(!error.is_retryable());
        assert_eq!(gateway.calls(), 0);
        assert!(sink.event_types().contains(&"plan.failed".to_owned()));
        assert!(!sink.event_types().contains(&"plan.engine_invoked".to_owned()));
    }

    #[tokio::test]
    async fn long_horizon_is_refused_and_cached() {
        let refusal = json!({ "status": "REFUSED", "summary": "Horizon exceeds 14 days" });
        let gateway = ScriptedGateway::new(vec![Ok(refusal)]);
        let cache = Arc::new(InMemoryPlanCache::default());
        let (orchestrator, _sink) = orchestrator(gateway.clone(), cache.clone(), 20);

        let outcome = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "plan the month", 20)
            .await
            .expect("refusal is an outcome");

        assert_eq!(outcome.plan.status(), PlanStatus::Refused);
        assert!(outcome.plan.items().is_empty());
        assert_eq!(cache.len().await, 1);

        let request = gateway.last_request().expect("engine was called");
        assert_eq!(request.context_annex["refusalRequired"], true);
    }

    #[tokio::test]
    async fn low_risk_on_critical_stock_is_rejected_and_not_cached() {
        let mut plan = weekend_plan();
        plan["items"][1]["riskLevel"] = json!("Low");
        let gateway = ScriptedGateway::new(vec![Ok(plan)]);
        let cache = Arc::new(InMemoryPlanCache::default());
        let (orchestrator, sink) = orchestrator(gateway.clone(), cache.clone(), 17);

        let error = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect_err("low risk on critical stock");

        assert!(error.is_malformed());
        assert_eq!(
            error.violation().map(|violation| violation.check),
            Some(ValidationCheck::LowStockRisk)
        );
        assert!(cache.is_empty().await);
        assert!(!sink.event_types().contains(&"plan.accepted".to_owned()));
    }

    #[tokio::test]
    async fn success_for_long_horizon_is_a_policy_inconsistency() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, _sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);

        let error = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 20)
            .await
            .expect_err("long horizon must be refused");

        assert!(matches!(error, PlanError::PolicyInconsistency(_)));
    }

    #[tokio::test]
    async fn gateway_failures_surface_without_retry() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Transport("connection refused".to_owned())),
            Err(GatewayError::NoStructuredOutput("free text".to_owned())),
        ]);
        let cache = Arc::new(InMemoryPlanCache::default());
        let (orchestrator, _sink) = orchestrator(gateway.clone(), cache.clone(), 17);

        let transport = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect_err("transport failure");
        assert!(matches!(transport, PlanError::Transport(_)));
        assert_eq!(gateway.calls(), 1);

        let unstructured = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect_err("no structured output");
        assert!(matches!(unstructured, PlanError::NoStructuredOutput(_)));
        assert_eq!(gateway.calls(), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn cache_scope_controls_sharing_between_callers() {
        {
            let gateway = ScriptedGateway::new(vec![Ok(weekend_plan()), Ok(weekend_plan())]);
            let (orchestrator, _sink) =
                orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);
            for id in ["kitchen-7", "kitchen-8"] {
                orchestrator.produce_plan(&caller(id), INVENTORY, "", 3).await.expect("plan");
            }
            assert_eq!(gateway.calls(), 2);
        }

        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, _sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 17);
        let orchestrator = orchestrator.with_cache_scope(CacheScope::Shared);
        for id in ["kitchen-7", "kitchen-8"] {
            orchestrator.produce_plan(&caller(id), INVENTORY, "", 3).await.expect("plan");
        }
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn cache_read_failure_stops_before_the_engine() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, _sink) =
            orchestrator(gateway.clone(), Arc::new(BrokenCache { fail_reads: true }), 17);

        let error = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect_err("cache unavailable");

        assert!(matches!(error, PlanError::Cache(_)));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn cache_write_failure_still_returns_fresh_plan() {
        let gateway = ScriptedGateway::new(vec![Ok(weekend_plan())]);
        let (orchestrator, sink) =
            orchestrator(gateway.clone(), Arc::new(BrokenCache { fail_reads: false }), 17);

        let outcome = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 3)
            .await
            .expect("plan despite cache failure");

        assert_eq!(outcome.origin, PlanOrigin::Fresh);
        assert_eq!(outcome.cache_write, None);
        assert!(sink.event_types().contains(&"plan.cache_write_failed".to_owned()));
    }

    #[tokio::test]
    async fn substituted_policy_table_moves_the_refusal_threshold() {
        let refusal = json!({ "status": "REFUSED", "summary": "Beyond a week" });
        let gateway = ScriptedGateway::new(vec![Ok(refusal)]);
        let (orchestrator, _sink) =
            orchestrator(gateway.clone(), Arc::new(InMemoryPlanCache::default()), 20);
        let orchestrator = orchestrator
            .with_policy_table(PolicyTable { refusal_horizon_days: 7, ..PolicyTable::standard() });

        let outcome = orchestrator
            .produce_plan(&caller("kitchen-7"), INVENTORY, "", 10)
            .await
            .expect("refused under the stricter table");

        assert_eq!(outcome.plan.status(), PlanStatus::Refused);
        assert_eq!(orchestrator.policy_table().refusal_horizon_days, 7);
        assert_eq!(RiskLevel::parse("High"), Some(RiskLevel::High));
    }
}
