use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::calendar::CalendarContext;
use crate::policy::PolicyId;

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex encoded SHA-256 of the canonical request bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated identity of whoever asked for a plan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "High" => Some(Self::High),
            "Medium" => Some(Self::Medium),
            "Low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

/// Amounts cross the wire as JSON numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub item_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_stock: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub recommended_order: Decimal,
    pub unit: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub estimated_cost: Decimal,
    pub risk_level: RiskLevel,
    pub applied_policy: PolicyId,
    pub reasoning: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPlan {
    pub summary: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub items: Vec<PlanItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefusedPlan {
    pub summary: String,
}

/// A validated plan. Refusal is an outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementPlan {
    Success(SuccessPlan),
    Refused(RefusedPlan),
}

impl ProcurementPlan {
    pub fn status(&self) -> PlanStatus {
        match self {
            Self::Success(_) => PlanStatus::Success,
            Self::Refused(_) => PlanStatus::Refused,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Success(plan) => &plan.summary,
            Self::Refused(plan) => &plan.summary,
        }
    }

    pub fn items(&self) -> &[PlanItem] {
        match self {
            Self::Success(plan) => &plan.items,
            Self::Refused(_) => &[],
        }
    }

    pub fn total_cost(&self) -> Option<Decimal> {
        match self {
            Self::Success(plan) => Some(plan.total_cost),
            Self::Refused(_) => None,
        }
    }

    /// SHA-256 over the serialized plan; used to tell identical cache writes
    /// from divergent ones.
    pub fn content_hash(&self) -> String {
        sha256_hex(&serde_json::to_vec(self).unwrap_or_default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Success,
    Refused,
}

impl PlanStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(Self::Success),
            "REFUSED" => Some(Self::Refused),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputsEcho {
    pub instruction_text: String,
    pub calendar_context: CalendarContext,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPlan {
    pub fingerprint: Fingerprint,
    pub response_body: ProcurementPlan,
    pub created_at: DateTime<Utc>,
    pub inputs_echo: InputsEcho,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    Cache,
    Fresh,
}
