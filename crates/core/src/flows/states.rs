use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Validating,
    CacheCheck,
    Requesting,
    ValidatingResponse,
    Caching,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
    Begin,
    InputAccepted,
    InvalidInput,
    CacheHit,
    CacheMiss,
    CacheUnavailable,
    StructuredReceived,
    GatewayError,
    Valid,
    Invalid,
    Cached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunAction {
    CanonicalizeRequest,
    LookupCache,
    ReturnCachedPlan,
    BuildEnvelope,
    InvokeEngine,
    ValidateResponse,
    StorePlan,
    ReturnFreshPlan,
    ReportFailure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RunState,
    pub to: RunState,
    pub event: RunEvent,
    pub actions: Vec<RunAction>,
}
