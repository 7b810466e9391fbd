use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The validation step a structured plan failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    RequiredFields,
    Status,
    RefusalConsistency,
    PolicyConsistency,
    CostArithmetic,
    LowStockRisk,
}

impl ValidationCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequiredFields => "required_fields",
            Self::Status => "status",
            Self::RefusalConsistency => "refusal_consistency",
            Self::PolicyConsistency => "policy_consistency",
            Self::CostArithmetic => "cost_arithmetic",
            Self::LowStockRisk => "low_stock_risk",
        }
    }
}

impl std::fmt::Display for ValidationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanViolation {
    pub check: ValidationCheck,
    pub detail: String,
}

impl PlanViolation {
    pub fn new(check: ValidationCheck, detail: impl Into<String>) -> Self {
        Self { check, detail: detail.into() }
    }
}

impl std::fmt::Display for PlanViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.check, self.detail)
    }
}

/// Terminal failure of one `produce_plan` invocation. A refusal is not an error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("reasoning engine transport failure: {0}")]
    Transport(String),
    #[error("reasoning engine returned no structured plan: {0}")]
    NoStructuredOutput(String),
    #[error("malformed plan: {0}")]
    MalformedPlan(PlanViolation),
    #[error("policy inconsistency: {0}")]
    PolicyInconsistency(PlanViolation),
    #[error("plan cache failure: {0}")]
    Cache(String),
}

impl PlanError {
    pub fn malformed(check: ValidationCheck, detail: impl Into<String>) -> Self {
        Self::MalformedPlan(PlanViolation::new(check, detail))
    }

    pub fn policy_inconsistency(check: ValidationCheck, detail: impl Into<String>) -> Self {
        Self::PolicyInconsistency(PlanViolation::new(check, detail))
    }

    /// Stable machine-readable class, used in CLI and HTTP payloads.
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Transport(_) => "transport",
            Self::NoStructuredOutput(_) => "no_structured_output",
            Self::MalformedPlan(_) => "malformed_plan",
            Self::PolicyInconsistency(_) => "policy_inconsistency",
            Self::Cache(_) => "cache",
        }
    }

    /// PolicyInconsistency is a MalformedPlan subtype.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPlan(_) | Self::PolicyInconsistency(_))
    }

    pub fn violation(&self) -> Option<&PlanViolation> {
        match self {
            Self::MalformedPlan(violation) | Self::PolicyInconsistency(violation) => {
                Some(violation)
            }
            _ => None,
        }
    }

    /// Only transport failures are worth retrying unchanged, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::BadGateway { .. } => {
                "The planning engine returned an unusable answer. No plan was produced."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl PlanError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::InvalidInput(_) => InterfaceError::BadRequest { message, correlation_id },
            Self::NoStructuredOutput(_) | Self::MalformedPlan(_) | Self::PolicyInconsistency(_) => {
                InterfaceError::BadGateway { message, correlation_id }
            }
            Self::Transport(_) | Self::Cache(_) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
