pub mod envelope;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::CalendarContext;

pub use envelope::{EnvelopeBuilder, PolicyEnvelope, ToolDefinition, SUBMIT_PLAN_TOOL};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyId {
    StandardOp,
    WeekendRush,
    HighImpactEvent,
    LowStockCritical,
    RefusalProtocol,
}

impl PolicyId {
    pub const ALL: [PolicyId; 5] = [
        PolicyId::StandardOp,
        PolicyId::WeekendRush,
        PolicyId::HighImpactEvent,
        PolicyId::LowStockCritical,
        PolicyId::RefusalProtocol,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StandardOp => "STANDARD_OP",
            Self::WeekendRush => "WEEKEND_RUSH",
            Self::HighImpactEvent => "HIGH_IMPACT_EVENT",
            Self::LowStockCritical => "LOW_STOCK_CRITICAL",
            Self::RefusalProtocol => "REFUSAL_PROTOCOL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == value)
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl MultiplierRange {
    pub fn fixed(value: Decimal) -> Self {
        Self { min: value, max: value }
    }

    pub fn render(&self) -> String {
        if self.min == self.max {
            format!("{}x", self.min.normalize())
        } else {
            format!("{}x-{}x", self.min.normalize(), self.max.normalize())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: PolicyId,
    pub trigger: String,
    pub multiplier: Option<MultiplierRange>,
    pub directive: String,
}

/// Immutable rule set handed to the envelope builder and the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    pub rules: Vec<PolicyRule>,
    /// Horizons strictly greater than this must be refused.
    pub refusal_horizon_days: u32,
    /// `currentStock < low_stock_ratio * avgDailyUsage` marks an item critical.
    pub low_stock_ratio: Decimal,
    /// Absolute tolerance for cost arithmetic checks.
    pub cost_tolerance: Decimal,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyTable {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                PolicyRule {
                    id: PolicyId::StandardOp,
                    trigger: "weekday, no detected event".to_string(),
                    multiplier: Some(MultiplierRange::fixed(Decimal::new(11, 1))),
                    directive: "Order average daily usage across the horizon with a 1.1x buffer."
                        .to_string(),
                },
                PolicyRule {
                    id: PolicyId::WeekendRush,
                    trigger: "Friday-Sunday".to_string(),
                    multiplier: Some(MultiplierRange {
                        min: Decimal::new(13, 1),
                        max: Decimal::new(15, 1),
                    }),
                    directive: "Scale demand for the weekend rush window.".to_string(),
                },
                PolicyRule {
                    id: PolicyId::HighImpactEvent,
                    trigger: "detected high-impact calendar event".to_string(),
                    multiplier: Some(MultiplierRange {
                        min: Decimal::new(18, 1),
                        max: Decimal::new(25, 1),
                    }),
                    directive: "Scale demand for the detected event.".to_string(),
                },
                PolicyRule {
                    id: PolicyId::LowStockCritical,
                    trigger: "currentStock < 0.2 x avgDailyUsage".to_string(),
                    multiplier: None,
                    directive: "Mandatory risk flag: riskLevel must be High or Medium, \
                                independent of the multiplier."
                        .to_string(),
                },
                PolicyRule {
                    id: PolicyId::RefusalProtocol,
                    trigger: "horizonDays > 14".to_string(),
                    multiplier: None,
                    directive: "Set status to REFUSED and return no items.".to_string(),
                },
            ],
            refusal_horizon_days: 14,
            low_stock_ratio: Decimal::new(2, 1),
            cost_tolerance: Decimal::new(1, 2),
        }
    }

    pub fn rule(&self, id: PolicyId) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn requires_refusal(&self, horizon_days: u32) -> bool {
        horizon_days > self.refusal_horizon_days
    }

    /// Whether an item in a SUCCESS plan may cite `id` under this calendar.
    pub fn is_applicable(&self, id: PolicyId, context: &CalendarContext) -> bool {
        match id {
            PolicyId::StandardOp => !context.is_weekend && !context.has_detected_events(),
            PolicyId::LowStockCritical => true,
            PolicyId::WeekendRush => {
                context.in_weekend_rush_window() || context.has_detected_events()
            }
            PolicyId::HighImpactEvent => context.has_detected_events(),
            PolicyId::RefusalProtocol => false,
        }
    }
}
