use std::collections::HashSet;

use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{RunAction, RunEvent, RunState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> RunState;
    fn transition(
        &self,
        current: RunState,
        event: RunEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Transition table for one `produce_plan` invocation.
#[derive(Clone, Debug, Default)]
pub struct PlanRunFlow;

impl FlowDefinition for PlanRunFlow {
    fn initial_state(&self) -> RunState {
        RunState::Idle
    }

    fn transition(
        &self,
        current: RunState,
        event: RunEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_plan_run(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> RunState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: RunState,
        event: RunEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: RunState,
        event: RunEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => sink.emit(
                audit
                    .event("flow.transition_applied", AuditCategory::Flow, AuditOutcome::Success)
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
            ),
            Err(error) => sink.emit(
                audit
                    .event("flow.transition_rejected", AuditCategory::Flow, AuditOutcome::Rejected)
                    .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

impl Default for FlowEngine<PlanRunFlow> {
    fn default() -> Self {
        Self::new(PlanRunFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RunState, event: RunEvent },
    #[error("run already finished in {state:?}")]
    AlreadyTerminal { state: RunState },
    #[error("state {state:?} was already visited in this run")]
    StateReentered { state: RunState },
}

fn transition_plan_run(
    current: RunState,
    event: RunEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use RunAction::{
        BuildEnvelope, CanonicalizeRequest, InvokeEngine, LookupCache, ReportFailure,
        ReturnCachedPlan, ReturnFreshPlan, StorePlan, ValidateResponse,
    };
    use RunEvent::{
        Begin, CacheHit, CacheMiss, CacheUnavailable, Cached, GatewayError, InputAccepted, Invalid,
        InvalidInput, StructuredReceived, Valid,
    };
    use RunState::{
        CacheCheck, Caching, Done, Failed, Idle, Requesting, Validating, ValidatingResponse,
    };

    if current.is_terminal() {
        return Err(FlowTransitionError::AlreadyTerminal { state: current });
    }

    let (to, actions) = match (current, event) {
        (Idle, Begin) => (Validating, vec![CanonicalizeRequest]),
        (Validating, InputAccepted) => (CacheCheck, vec![LookupCache]),
        (Validating, InvalidInput) => (Failed, vec![ReportFailure]),
        (CacheCheck, CacheHit) => (Done, vec![ReturnCachedPlan]),
        (CacheCheck, CacheMiss) => (Requesting, vec![BuildEnvelope, InvokeEngine]),
        (CacheCheck, CacheUnavailable) => (Failed, vec![ReportFailure]),
        (Requesting, StructuredReceived) => (ValidatingResponse, vec![ValidateResponse]),
        (Requesting, GatewayError) => (Failed, vec![ReportFailure]),
        (ValidatingResponse, Valid) => (Caching, vec![StorePlan]),
        (ValidatingResponse, Invalid) => (Failed, vec![ReportFailure]),
        (Caching, Cached) => (Done, vec![ReturnFreshPlan]),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

/// A single pass through the flow. Tracks visited states so that no state is
/// entered twice and nothing moves after a terminal state.
pub struct PlanRun<'a, F> {
    engine: &'a FlowEngine<F>,
    state: RunState,
    visited: HashSet<RunState>,
    history: Vec<TransitionOutcome>,
}

impl<'a, F> PlanRun<'a, F>
where
    F: FlowDefinition,
{
    pub fn start(engine: &'a FlowEngine<F>) -> Self {
        let state = engine.initial_state();
        Self { engine, state, visited: HashSet::from([state]), history: Vec::new() }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[TransitionOutcome] {
        &self.history
    }

    pub fn into_history(self) -> Vec<TransitionOutcome> {
        self.history
    }

    pub fn advance<S>(
        &mut self,
        event: RunEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<&TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let outcome = self.engine.apply_with_audit(self.state, event, sink, audit)?;
        if !self.visited.insert(outcome.to) {
            return Err(FlowTransitionError::StateReentered { state: outcome.to });
        }
        self.state = outcome.to;
        self.history.push(outcome);
        Ok(&self.history[self.history.len() - 1])
    }
}
