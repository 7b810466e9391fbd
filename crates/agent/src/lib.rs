//! Reasoning-engine side of restock.
//!
//! `llm` and `providers` reach the external engine through one forced
//! structured tool call. `runtime` hosts [`PlanOrchestrator`], which derives
//! context, consults the plan cache, invokes the engine once and validates
//! what comes back before anything is cached or returned.

pub mod llm;
pub mod providers;
pub mod runtime;
pub mod tools;

pub use llm::{build_gateway, GatewayError, GatewayRequest, ReasoningGateway, StructuredInvocation};
pub use runtime::{PlanOrchestrator, PlanOutcome};
