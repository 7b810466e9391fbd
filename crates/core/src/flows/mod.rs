pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, PlanRun, PlanRunFlow};
pub use states::{RunAction, RunEvent, RunState, TransitionOutcome};
