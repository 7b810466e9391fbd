//! Turns the engine's untyped structured payload into a typed
//! [`ProcurementPlan`], or names the first check it violates.
//!
//! Checks run in a fixed order: required fields, status, refusal
//! consistency, policy consistency, cost arithmetic, low-stock risk. Nothing is
//! coerced; a failing payload never becomes a partial plan.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::canonical::CanonicalRequest;
use crate::domain::plan::{
    PlanItem, PlanStatus, ProcurementPlan, RefusedPlan, RiskLevel, SuccessPlan,
};
use crate::errors::PlanError;
use crate::policy::{PolicyId, PolicyTable};

use crate::errors::ValidationCheck::{
    CostArithmetic, LowStockRisk, PolicyConsistency, RefusalConsistency, RequiredFields, Status,
};

#[derive(Clone, Debug, Default)]
pub struct ResponseValidator {
    table: PolicyTable,
}

/// Item fields as read from the payload, before policy checks.
struct RawItem {
    item: PlanItem,
    applied_policy: String,
    risk_level: String,
}

impl ResponseValidator {
    pub fn new(table: PolicyTable) -> Self {
        Self { table }
    }

    pub fn validate(
        &self,
        payload: &Value,
        request: &CanonicalRequest,
    ) -> Result<ProcurementPlan, PlanError> {
        let object = payload
            .as_object()
            .ok_or_else(|| PlanError::malformed(RequiredFields, "payload is not a JSON object"))?;

        // (a) required fields
        let status_raw = require_str(object, "status", "plan")?;
        let summary = require_str(object, "summary", "plan")?.to_string();
        let raw_items = read_items(object)?;

        // (b) status
        let status = PlanStatus::parse(status_raw).ok_or_else(|| {
            PlanError::malformed(Status, format!("status `{status_raw}` is not SUCCESS or REFUSED"))
        })?;

        // (c) refusal consistency
        let refusal_required = self.table.requires_refusal(request.horizon_days);
        match status {
            PlanStatus::Refused => {
                if !refusal_required {
                    return Err(PlanError::policy_inconsistency(
                        RefusalConsistency,
                        format!(
                            "plan refused a {} day horizon, which does not exceed {} days",
                            request.horizon_days, self.table.refusal_horizon_days
                        ),
                    ));
                }
                if !raw_items.is_empty() {
                    return Err(PlanError::malformed(
                        RefusalConsistency,
                        format!("refused plan carries {} item(s)", raw_items.len()),
                    ));
                }
                return Ok(ProcurementPlan::Refused(RefusedPlan { summary }));
            }
            PlanStatus::Success if refusal_required => {
                return Err(PlanError::policy_inconsistency(
                    RefusalConsistency,
                    format!(
                        "plan succeeded for a {} day horizon; horizons over {} days must be refused",
                        request.horizon_days, self.table.refusal_horizon_days
                    ),
                ));
            }
            PlanStatus::Success => {}
        }

        let total_cost = require_amount(object, "totalCost", "plan")?;
        if raw_items.is_empty() {
            return Err(PlanError::malformed(RequiredFields, "successful plan has no items"));
        }

        let mut items = Vec::with_capacity(raw_items.len());
        for (index, raw) in raw_items.into_iter().enumerate() {
            items.push(self.check_item(index, raw, request)?);
        }

        // (e) cost arithmetic, plan level
        let sum = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.estimated_cost))
            .ok_or_else(|| {
                PlanError::malformed(CostArithmetic, "sum of item estimatedCost values overflows")
            })?;
        if (total_cost - sum).abs() > self.table.cost_tolerance {
            return Err(PlanError::malformed(
                CostArithmetic,
                format!("totalCost {total_cost} differs from item sum {sum}"),
            ));
        }

        // (f) low-stock risk
        for item in &items {
            self.check_low_stock(item, request)?;
        }

        Ok(ProcurementPlan::Success(SuccessPlan { summary, total_cost, items }))
    }

    fn check_item(
        &self,
        index: usize,
        raw: RawItem,
        request: &CanonicalRequest,
    ) -> Result<PlanItem, PlanError> {
        let RawItem { mut item, applied_policy, risk_level } = raw;

        item.risk_level = RiskLevel::parse(&risk_level).ok_or_else(|| {
            PlanError::malformed(
                RequiredFields,
                format!("items[{index}].riskLevel `{risk_level}` is not High, Medium or Low"),
            )
        })?;

        // (d) policy identifiers and calendar consistency
        let policy = PolicyId::parse(&applied_policy).ok_or_else(|| {
            PlanError::malformed(
                PolicyConsistency,
                format!("items[{index}].appliedPolicy `{applied_policy}` is not a known policy"),
            )
        })?;
        if !self.table.is_applicable(policy, &request.calendar_context) {
            return Err(PlanError::policy_inconsistency(
                PolicyConsistency,
                format!(
                    "items[{index}] ({}) applies {policy}, which does not match the calendar \
                     context ({}, events: {})",
                    item.item_name,
                    request.calendar_context.date_label,
                    request.calendar_context.detected_events.len()
                ),
            ));
        }
        item.applied_policy = policy;

        // (e) cost arithmetic, item level
        let expected = item.recommended_order.checked_mul(item.unit_price).ok_or_else(|| {
            PlanError::malformed(
                CostArithmetic,
                format!(
                    "items[{index}] ({}) recommendedOrder x unitPrice overflows",
                    item.item_name
                ),
            )
        })?;
        if (item.estimated_cost - expected).abs() > self.table.cost_tolerance {
            return Err(PlanError::malformed(
                CostArithmetic,
                format!(
                    "items[{index}] ({}) estimatedCost {} differs from {} x {} = {}",
                    item.item_name,
                    item.estimated_cost,
                    item.recommended_order,
                    item.unit_price,
                    expected
                ),
            ));
        }

        Ok(item)
    }

    fn check_low_stock(&self, item: &PlanItem, request: &CanonicalRequest) -> Result<(), PlanError> {
        let flagged = item.applied_policy == PolicyId::LowStockCritical;
        let critical = request
            .find_line(&item.item_name)
            .is_some_and(|line| line.is_critically_low(self.table.low_stock_ratio));

        if (flagged || critical) && !item.risk_level.is_elevated() {
            return Err(PlanError::malformed(
                LowStockRisk,
                format!(
                    "{} is critically low on stock but carries riskLevel {:?}",
                    item.item_name, item.risk_level
                ),
            ));
        }
        Ok(())
    }
}

fn read_items(object: &Map<String, Value>) -> Result<Vec<RawItem>, PlanError> {
    let items = match object.get("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(PlanError::malformed(RequiredFields, "items is not an array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let location = format!("items[{index}]");
            let item = value.as_object().ok_or_else(|| {
                PlanError::malformed(RequiredFields, format!("{location} is not an object"))
            })?;

            let reasoning = require_str(item, "reasoning", &location)?;
            if reasoning.trim().is_empty() {
                return Err(PlanError::malformed(
                    RequiredFields,
                    format!("{location}.reasoning is empty"),
                ));
            }

            Ok(RawItem {
                item: PlanItem {
                    item_name: require_str(item, "itemName", &location)?.to_string(),
                    current_stock: require_amount(item, "currentStock", &location)?,
                    recommended_order: require_amount(item, "recommendedOrder", &location)?,
                    unit: require_str(item, "unit", &location)?.to_string(),
                    unit_price: require_amount(item, "unitPrice", &location)?,
                    estimated_cost: require_amount(item, "estimatedCost", &location)?,
                    risk_level: RiskLevel::Low,
                    applied_policy: PolicyId::StandardOp,
                    reasoning: reasoning.to_string(),
                },
                applied_policy: require_str(item, "appliedPolicy", &location)?.to_string(),
                risk_level: require_str(item, "riskLevel", &location)?.to_string(),
            })
        })
        .collect()
}

fn require_str<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    location: &str,
) -> Result<&'a str, PlanError> {
    object.get(field).and_then(Value::as_str).ok_or_else(|| {
        PlanError::malformed(RequiredFields, format!("{location}.{field} is missing or not a string"))
    })
}

/// Non-negative number.
fn require_amount(
    object: &Map<String, Value>,
    field: &str,
    location: &str,
) -> Result<Decimal, PlanError> {
    let value = object.get(field).and_then(Value::as_f64).ok_or_else(|| {
        PlanError::malformed(RequiredFields, format!("{location}.{field} is missing or not a number"))
    })?;
    let amount = Decimal::from_f64(value).ok_or_else(|| {
        PlanError::malformed(RequiredFields, format!("{location}.{field} is out of range"))
    })?;
    if amount < Decimal::ZERO {
        return Err(PlanError::malformed(
            RequiredFields,
            format!("{location}.{field} must not be negative"),
        ));
    }
    Ok(amount.normalize())
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use serde_json::{json, Value};

    use super::ResponseValidator;
    use crate::calendar::ContextDeriver;
    use crate::canonical::{CanonicalRequest, Canonicalizer};
    use crate::domain::plan::{PlanStatus, ProcurementPlan, RiskLevel};
    use crate::errors::{PlanError, ValidationCheck};
    use crate::policy::PolicyId;

    /// 2026-10-17 is a Saturday; 2026-10-20 a Tuesday.
    fn request(day: u32, horizon_days: u32, inventory: &str) -> CanonicalRequest {
        let now = FixedOffset::east_opt(0)
            .and_then(|offset| offset.with_ymd_and_hms(2026, 10, day, 9, 0, 0).single())
            .expect("timestamp");
        let context = ContextDeriver::default().derive(now, horizon_days);
        Canonicalizer::default()
            .canonicalize(inventory, "prep for the weekend", context, horizon_days)
            .expect("valid request")
            .0
    }

    fn item(name: &str, order: f64, price: f64, risk: &str, policy: &str) -> Value {
        json!({
            "itemName": name,
            "currentStock": 2,
            "recommendedOrder": order,
            "unit": "kg",
            "unitPrice": price,
            "estimatedCost": order * price,
            "riskLevel": risk,
            "appliedPolicy": policy,
            "reasoning": "Weekend demand uplift"
        })
    }

    fn violation(result: Result<ProcurementPlan, PlanError>) -> (bool, ValidationCheck) {
        let error = result.expect_err("payload should be rejected");
        let inconsistent = matches!(error, PlanError::PolicyInconsistency(_));
        let check = error.violation().map(|violation| violation.check).expect("named check");
        (inconsistent, check)
    }

    #[test]
    fn weekend_plan_is_accepted() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS",
            "summary": "Weekend top-up",
            "totalCost": 3420,
            "items": [item("Paneer", 9.0, 380.0, "Medium", "WEEKEND_RUSH")]
        });

        let plan = ResponseValidator::default().validate(&payload, &request).expect("valid plan");
        assert_eq!(plan.status(), PlanStatus::Success);
        assert_eq!(plan.items()[0].applied_policy, PolicyId::WeekendRush);
        assert_eq!(plan.items()[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn refusal_for_long_horizon_is_accepted_without_items() {
        let request = request(17, 20, "Paneer,2,kg,3,380");
        let payload = json!({"status": "REFUSED", "summary": "Horizon too long"});

        let plan = ResponseValidator::default().validate(&payload, &request).expect("refusal");
        assert_eq!(plan.status(), PlanStatus::Refused);
        assert!(plan.items().is_empty());
        assert_eq!(plan.total_cost(), None);

        let with_empty_items = json!({"status": "REFUSED", "summary": "No", "items": []});
        assert!(ResponseValidator::default().validate(&with_empty_items, &request).is_ok());
    }

    #[test]
    fn refusal_for_compliant_horizon_is_policy_inconsistency() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let payload = json!({"status": "REFUSED", "summary": "Not today"});

        let (inconsistent, check) =
            violation(ResponseValidator::default().validate(&payload, &request));
        assert!(inconsistent);
        assert_eq!(check, ValidationCheck::RefusalConsistency);
    }

    #[test]
    fn success_for_long_horizon_is_rejected() {
        let request = request(17, 20, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS",
            "summary": "Big order",
            "totalCost": 3420,
            "items": [item("Paneer", 9.0, 380.0, "Medium", "WEEKEND_RUSH")]
        });

        let (inconsistent, check) =
            violation(ResponseValidator::default().validate(&payload, &request));
        assert!(inconsistent);
        assert_eq!(check, ValidationCheck::RefusalConsistency);
    }

    #[test]
    fn missing_fields_and_bad_status_are_named() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let validator = ResponseValidator::default();

        let (_, check) = violation(validator.validate(&json!({"summary": "x"}), &request));
        assert_eq!(check, ValidationCheck::RequiredFields);

        let (_, check) = violation(validator.validate(&json!("just text"), &request));
        assert_eq!(check, ValidationCheck::RequiredFields);

        let payload = json!({"status": "MAYBE", "summary": "x"});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::Status);

        let payload = json!({"status": "SUCCESS", "summary": "x", "items": [item("Paneer", 1.0, 380.0, "Low", "STANDARD_OP")]});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::RequiredFields, "totalCost is required on success");

        let payload = json!({"status": "SUCCESS", "summary": "x", "totalCost": 0, "items": []});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::RequiredFields, "success needs items");
    }

    #[test]
    fn empty_reasoning_and_negative_amounts_are_rejected() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let validator = ResponseValidator::default();

        let mut bad = item("Paneer", 1.0, 380.0, "Low", "STANDARD_OP");
        bad["reasoning"] = json!("  ");
        let payload = json!({"status": "SUCCESS", "summary": "x", "totalCost": 380, "items": [bad]});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::RequiredFields);

        let mut bad = item("Paneer", 1.0, 380.0, "Low", "STANDARD_OP");
        bad["recommendedOrder"] = json!(-1);
        let payload = json!({"status": "SUCCESS", "summary": "x", "totalCost": 380, "items": [bad]});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::RequiredFields);
    }

    #[test]
    fn unknown_or_mismatched_policy_is_rejected() {
        let validator = ResponseValidator::default();

        let saturday = request(17, 3, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 380,
            "items": [item("Paneer", 1.0, 380.0, "Low", "PANIC_BUY")]
        });
        let (inconsistent, check) = violation(validator.validate(&payload, &saturday));
        assert!(!inconsistent);
        assert_eq!(check, ValidationCheck::PolicyConsistency);

        let tuesday = request(20, 2, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 380,
            "items": [item("Paneer", 1.0, 380.0, "Low", "WEEKEND_RUSH")]
        });
        let (inconsistent, check) = violation(validator.validate(&payload, &tuesday));
        assert!(inconsistent);
        assert_eq!(check, ValidationCheck::PolicyConsistency);

        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 380,
            "items": [item("Paneer", 1.0, 380.0, "Low", "HIGH_IMPACT_EVENT")]
        });
        let (_, check) = violation(validator.validate(&payload, &saturday));
        assert_eq!(check, ValidationCheck::PolicyConsistency);
    }

    #[test]
    fn cost_arithmetic_is_checked_within_tolerance() {
        let request = request(17, 3, "Paneer,2,kg,3,380\nTomatoes,2,kg,6,60");
        let validator = ResponseValidator::default();

        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 3960.004,
            "items": [
                item("Paneer", 9.0, 380.0, "Medium", "WEEKEND_RUSH"),
                item("Tomatoes", 9.0, 60.0, "Low", "WEEKEND_RUSH")
            ]
        });
        assert!(validator.validate(&payload, &request).is_ok());

        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 4000,
            "items": [
                item("Paneer", 9.0, 380.0, "Medium", "WEEKEND_RUSH"),
                item("Tomatoes", 9.0, 60.0, "Low", "WEEKEND_RUSH")
            ]
        });
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::CostArithmetic);

        let mut wrong = item("Paneer", 9.0, 380.0, "Medium", "WEEKEND_RUSH");
        wrong["estimatedCost"] = json!(3000);
        let payload = json!({"status": "SUCCESS", "summary": "x", "totalCost": 3000, "items": [wrong]});
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::CostArithmetic);
    }

    #[test]
    fn overflowing_item_product_is_cost_arithmetic_failure() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let mut huge = item("Paneer", 1.0, 1.0, "Medium", "WEEKEND_RUSH");
        huge["recommendedOrder"] = json!(1e20);
        huge["unitPrice"] = json!(1e20);
        huge["estimatedCost"] = json!(1);
        let payload = json!({"status": "SUCCESS", "summary": "x", "totalCost": 1, "items": [huge]});

        let (inconsistent, check) =
            violation(ResponseValidator::default().validate(&payload, &request));
        assert!(!inconsistent);
        assert_eq!(check, ValidationCheck::CostArithmetic);
    }

    #[test]
    fn overflowing_item_sum_is_cost_arithmetic_failure() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 1,
            "items": [
                item("Saffron", 4e28, 1.0, "Low", "WEEKEND_RUSH"),
                item("Truffle", 4e28, 1.0, "Low", "WEEKEND_RUSH")
            ]
        });

        let error = ResponseValidator::default()
            .validate(&payload, &request)
            .expect_err("overflowing sum should be rejected");
        let violation = error.violation().expect("named check");
        assert_eq!(violation.check, ValidationCheck::CostArithmetic);
        assert!(violation.detail.contains("overflows"), "unexpected detail: {}", violation.detail);
    }

    #[test]
    fn standard_op_is_only_consistent_on_quiet_weekdays() {
        let validator = ResponseValidator::default();
        let standard = |request: &CanonicalRequest| {
            let payload = json!({
                "status": "SUCCESS", "summary": "x", "totalCost": 380,
                "items": [item("Paneer", 1.0, 380.0, "Low", "STANDARD_OP")]
            });
            validator.validate(&payload, request)
        };

        let tuesday = request(20, 2, "Paneer,2,kg,3,380");
        assert!(standard(&tuesday).is_ok());

        let saturday = request(17, 3, "Paneer,2,kg,3,380");
        let (inconsistent, check) = violation(standard(&saturday));
        assert!(inconsistent);
        assert_eq!(check, ValidationCheck::PolicyConsistency);

        // 2026-12-23 is a Wednesday; Christmas Eve falls inside a 3 day horizon.
        let now = FixedOffset::east_opt(0)
            .and_then(|offset| offset.with_ymd_and_hms(2026, 12, 23, 9, 0, 0).single())
            .expect("timestamp");
        let context = ContextDeriver::default().derive(now, 3);
        assert!(context.has_detected_events());
        let event_week = Canonicalizer::default()
            .canonicalize("Paneer,2,kg,3,380", "holiday prep", context, 3)
            .expect("valid request")
            .0;
        let (inconsistent, check) = violation(standard(&event_week));
        assert!(inconsistent);
        assert_eq!(check, ValidationCheck::PolicyConsistency);
    }

    #[test]
    fn critically_low_item_must_not_be_low_risk() {
        let request = request(17, 3, "Oil,0.5,liters,5,150");
        let validator = ResponseValidator::default();

        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 1500,
            "items": [item("Oil", 10.0, 150.0, "Low", "WEEKEND_RUSH")]
        });
        let (_, check) = violation(validator.validate(&payload, &request));
        assert_eq!(check, ValidationCheck::LowStockRisk);

        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 1500,
            "items": [item("Oil", 10.0, 150.0, "High", "LOW_STOCK_CRITICAL")]
        });
        assert!(validator.validate(&payload, &request).is_ok());
    }

    #[test]
    fn low_stock_policy_flag_requires_elevated_risk_even_for_unknown_items() {
        let request = request(17, 3, "Paneer,2,kg,3,380");
        let payload = json!({
            "status": "SUCCESS", "summary": "x", "totalCost": 100,
            "items": [item("Ghee", 1.0, 100.0, "Low", "LOW_STOCK_CRITICAL")]
        });

        let (_, check) = violation(ResponseValidator::default().validate(&payload, &request));
        assert_eq!(check, ValidationCheck::LowStockRisk);
    }
}
