use serde::{Deserialize, Serialize};

use crate::domain::calendar::CalendarContext;
use crate::domain::inventory::{parse_inventory, InventoryLine};
use crate::domain::plan::{sha256_hex, Fingerprint};
use crate::errors::PlanError;

pub const CANONICAL_VERSION: &str = "restock.request.v1";
pub const FIELD_SEPARATOR: char = ',';
pub const DEFAULT_MIN_INVENTORY_CHARS: usize = 10;
/// Caller-side soft guard. The refusal threshold itself lives in the policy table.
pub const CALLER_HORIZON_DAYS: std::ops::RangeInclusive<u32> = 1..=30;

pub fn check_caller_horizon(horizon_days: u32) -> Result<(), PlanError> {
    if CALLER_HORIZON_DAYS.contains(&horizon_days) {
        Ok(())
    } else {
        Err(PlanError::InvalidInput(format!(
            "horizonDays must be between {} and {}, got {horizon_days}",
            CALLER_HORIZON_DAYS.start(),
            CALLER_HORIZON_DAYS.end()
        )))
    }
}

/// Normalized request, built per invocation and dropped afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    pub inventory_text: String,
    pub lines: Vec<InventoryLine>,
    pub instruction_text: String,
    pub horizon_days: u32,
    pub calendar_context: CalendarContext,
}

impl CanonicalRequest {
    pub fn find_line(&self, item_name: &str) -> Option<&InventoryLine> {
        self.lines.iter().find(|line| line.matches_name(item_name))
    }

    /// User-facing request text handed to the reasoning engine.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("Planning horizon: {} day(s)\n", self.horizon_days));
        prompt.push_str("Inventory (name, currentStock, unit, avgDailyUsage, marketPrice):\n");
        for line in &self.lines {
            prompt.push_str(&format!(
                "- {}, {}, {}, {}, {}\n",
                line.name,
                line.current_stock.normalize(),
                line.unit,
                line.avg_daily_usage.normalize(),
                line.market_price.normalize()
            ));
        }
        prompt.push_str("Instruction:\n");
        if self.instruction_text.is_empty() {
            prompt.push_str("(none)\n");
        } else {
            prompt.push_str(&self.instruction_text);
            prompt.push('\n');
        }
        prompt
    }
}

#[derive(Clone, Debug)]
pub struct Canonicalizer {
    min_inventory_chars: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self { min_inventory_chars: DEFAULT_MIN_INVENTORY_CHARS }
    }
}

impl Canonicalizer {
    pub fn new(min_inventory_chars: usize) -> Self {
        Self { min_inventory_chars }
    }

    pub fn canonicalize(
        &self,
        inventory_text: &str,
        instruction_text: &str,
        calendar_context: CalendarContext,
        horizon_days: u32,
    ) -> Result<(CanonicalRequest, Fingerprint), PlanError> {
        let inventory_text = normalize_text(inventory_text);
        let instruction_text = normalize_text(instruction_text);

        self.check_inventory_shape(&inventory_text)?;
        if horizon_days == 0 {
            return Err(PlanError::InvalidInput("horizonDays must be at least 1".to_string()));
        }
        if calendar_context.horizon_days != horizon_days {
            return Err(PlanError::InvalidInput(format!(
                "calendar context horizon {} does not match requested horizon {horizon_days}",
                calendar_context.horizon_days
            )));
        }

        let lines = parse_inventory(&inventory_text)
            .map_err(|error| PlanError::InvalidInput(error.to_string()))?;

        let fingerprint = fingerprint(&inventory_text, &instruction_text, &calendar_context);
        let request = CanonicalRequest {
            inventory_text,
            lines,
            instruction_text,
            horizon_days,
            calendar_context,
        };
        Ok((request, fingerprint))
    }

    fn check_inventory_shape(&self, inventory_text: &str) -> Result<(), PlanError> {
        if inventory_text.is_empty() {
            return Err(PlanError::InvalidInput("inventory text is empty".to_string()));
        }
        if inventory_text.chars().count() < self.min_inventory_chars {
            return Err(PlanError::InvalidInput(format!(
                "inventory text is shorter than {} characters",
                self.min_inventory_chars
            )));
        }
        if !inventory_text.contains(FIELD_SEPARATOR) {
            return Err(PlanError::InvalidInput(format!(
                "inventory text contains no `{FIELD_SEPARATOR}` field separator"
            )));
        }
        Ok(())
    }
}

pub fn normalize_text(value: &str) -> String {
    value.replace("\r\n", "\n").trim().to_string()
}

/// Length-prefixed encoding of the three logical inputs. Free text never needs
/// escaping because every field announces its byte length up front.
pub fn canonical_bytes(
    inventory_text: &str,
    instruction_text: &str,
    calendar_context: &CalendarContext,
) -> Vec<u8> {
    // Struct field order and the BTreeSet of events keep this stable.
    let context_json = serde_json::to_string(calendar_context).unwrap_or_default();

    let mut bytes = Vec::with_capacity(
        CANONICAL_VERSION.len() + inventory_text.len() + instruction_text.len() + context_json.len() + 64,
    );
    bytes.extend_from_slice(CANONICAL_VERSION.as_bytes());
    bytes.push(b'\n');
    for (label, value) in [
        ("inventory", inventory_text),
        ("instruction", instruction_text),
        ("context", context_json.as_str()),
    ] {
        bytes.extend_from_slice(format!("{label}:{}:", value.len()).as_bytes());
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

pub fn fingerprint(
    inventory_text: &str,
    instruction_text: &str,
    calendar_context: &CalendarContext,
) -> Fingerprint {
    Fingerprint(sha256_hex(&canonical_bytes(inventory_text, instruction_text, calendar_context)))
}
