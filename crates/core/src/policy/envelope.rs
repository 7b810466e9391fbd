//! Policy envelope: the fixed rules and output contract that bound what the
//! reasoning engine may decide.
//!
//! The envelope is a pure function of the calendar context and the injected
//! [`PolicyTable`]. The table is restated as hard constraints so the engine
//! never has to rediscover it, and the only accepted completion is a single
//! call to [`SUBMIT_PLAN_TOOL`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::calendar::CalendarContext;
use crate::policy::{PolicyId, PolicyRule, PolicyTable};

pub const SUBMIT_PLAN_TOOL: &str = "submitProcurementPlan";

/// Callable operation declared to the engine; `parameters` is a JSON Schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyEnvelope {
    pub rules: Vec<PolicyRule>,
    pub refusal_horizon_days: u32,
    pub system_instruction: String,
    /// Opaque calendar annex attached to the request so the policy decision
    /// can see the same context the fingerprint was computed over.
    pub context_annex: Value,
    pub tool: ToolDefinition,
}

#[derive(Clone, Debug, Default)]
pub struct EnvelopeBuilder {
    table: PolicyTable,
}

impl EnvelopeBuilder {
    pub fn new(table: PolicyTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn build(&self, context: &CalendarContext) -> PolicyEnvelope {
        PolicyEnvelope {
            rules: self.table.rules.clone(),
            refusal_horizon_days: self.table.refusal_horizon_days,
            system_instruction: self.render_instruction(),
            context_annex: context_annex(context, self.table.requires_refusal(context.horizon_days)),
            tool: submit_plan_tool(),
        }
    }

    fn render_instruction(&self) -> String {
        let mut text = String::from(
            "You are a procurement planner for a commercial kitchen. You recommend \
             purchase quantities for the inventory supplied by the user, over the \
             stated planning horizon.\n\nHARD CONSTRAINTS (not negotiable):\n",
        );

        for rule in &self.table.rules {
            let multiplier = rule
                .multiplier
                .map(|range| format!(" Multiplier: {}.", range.render()))
                .unwrap_or_default();
            text.push_str(&format!(
                "- {} (trigger: {}).{} {}\n",
                rule.id, rule.trigger, multiplier, rule.directive
            ));
        }

        text.push_str(&format!(
            "- A horizon longer than {} days MUST be answered with status REFUSED and no items.\n",
            self.table.refusal_horizon_days
        ));
        text.push_str(&format!(
            "- An item with currentStock < {} x avgDailyUsage MUST carry riskLevel High or Medium.\n",
            self.table.low_stock_ratio.normalize()
        ));
        text.push_str(
            "- appliedPolicy MUST be one of: STANDARD_OP, WEEKEND_RUSH, HIGH_IMPACT_EVENT, \
             LOW_STOCK_CRITICAL, REFUSAL_PROTOCOL, and MUST match the calendar context annex.\n",
        );
        text.push_str(
            "- estimatedCost MUST equal recommendedOrder x unitPrice and totalCost MUST equal \
             the sum of estimatedCost, rounded to two decimals.\n\n",
        );
        text.push_str(&format!(
            "OUTPUT CONTRACT:\n- Free-form conversational replies are not accepted.\n\
             - Complete the task by calling `{SUBMIT_PLAN_TOOL}` exactly once. That single \
             structured submission is the only acceptable form of completion.\n"
        ));
        text
    }
}

fn context_annex(context: &CalendarContext, refusal_required: bool) -> Value {
    json!({
        "calendarContext": context,
        "weekendRushWindow": context.in_weekend_rush_window(),
        "refusalRequired": refusal_required,
    })
}

pub fn submit_plan_tool() -> ToolDefinition {
    let policy_ids: Vec<&str> = PolicyId::ALL.iter().map(|id| id.as_str()).collect();

    ToolDefinition {
        name: SUBMIT_PLAN_TOOL.to_string(),
        description: "Submit the final procurement plan. Call exactly once.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["SUCCESS", "REFUSED"] },
                "summary": { "type": "string" },
                "totalCost": { "type": "number", "minimum": 0 },
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "itemName": { "type": "string" },
                            "currentStock": { "type": "number", "minimum": 0 },
                            "recommendedOrder": { "type": "number", "minimum": 0 },
                            "unit": { "type": "string" },
                            "unitPrice": { "type": "number", "minimum": 0 },
                            "estimatedCost": { "type": "number", "minimum": 0 },
                            "riskLevel": { "type": "string", "enum": ["High", "Medium", "Low"] },
                            "appliedPolicy": { "type": "string", "enum": policy_ids },
                            "reasoning": { "type": "string" }
                        },
                        "required": [
                            "itemName", "currentStock", "recommendedOrder", "unit", "unitPrice",
                            "estimatedCost", "riskLevel", "appliedPolicy", "reasoning"
                        ]
                    }
                }
            },
            "required": ["status", "summary"]
        }),
    }
}
