pub mod audit;
pub mod cache;
pub mod calendar;
pub mod canonical;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod policy;
pub mod validation;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use cache::{CacheError, CacheNamespace, CacheScope, PlanCache, StoreOutcome};
pub use calendar::{CalendarEvent, Clock, ContextDeriver, FixedClock, SystemClock};
pub use canonical::{CanonicalRequest, Canonicalizer};
pub use domain::calendar::CalendarContext;
pub use domain::inventory::InventoryLine;
pub use domain::plan::{
    CachedPlan, CallerId, Fingerprint, InputsEcho, PlanItem, PlanOrigin, PlanStatus,
    ProcurementPlan, RiskLevel,
};
pub use errors::{InterfaceError, PlanError, PlanViolation, ValidationCheck};
pub use policy::{EnvelopeBuilder, PolicyEnvelope, PolicyId, PolicyTable, ToolDefinition};
pub use validation::ResponseValidator;
