use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of comma separated columns in an inventory row:
/// `name,currentStock,unit,avgDailyUsage,marketPrice`.
pub const INVENTORY_COLUMNS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    pub name: String,
    pub current_stock: Decimal,
    pub unit: String,
    pub avg_daily_usage: Decimal,
    pub market_price: Decimal,
}

impl InventoryLine {
    /// True when stock on hand is below `ratio` days of average usage.
    pub fn is_critically_low(&self, ratio: Decimal) -> bool {
        self.current_stock < ratio * self.avg_daily_usage
    }

    pub fn matches_name(&self, item_name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(item_name.trim())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryParseError {
    pub line_number: usize,
    pub reason: String,
}

impl std::fmt::Display for InventoryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inventory line {}: {}", self.line_number, self.reason)
    }
}

/// Parses normalized inventory text into ordered lines.
///
/// Blank lines are skipped. The first non-blank row is treated as a header when
/// its stock column is not numeric.
pub fn parse_inventory(text: &str) -> Result<Vec<InventoryLine>, InventoryParseError> {
    let mut lines = Vec::new();
    let mut seen_row = false;

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        let first_row = !seen_row;
        seen_row = true;

        if first_row && looks_like_header(&fields) {
            continue;
        }

        if fields.len() != INVENTORY_COLUMNS {
            return Err(InventoryParseError {
                line_number,
                reason: format!("expected {INVENTORY_COLUMNS} fields, found {}", fields.len()),
            });
        }

        let name = fields[0];
        if name.is_empty() {
            return Err(InventoryParseError { line_number, reason: "item name is empty".into() });
        }

        lines.push(InventoryLine {
            name: name.to_string(),
            current_stock: parse_quantity(fields[1], "currentStock", line_number)?,
            unit: fields[2].to_string(),
            avg_daily_usage: parse_quantity(fields[3], "avgDailyUsage", line_number)?,
            market_price: parse_quantity(fields[4], "marketPrice", line_number)?,
        });
    }

    if lines.is_empty() {
        return Err(InventoryParseError { line_number: 0, reason: "no inventory rows".into() });
    }

    Ok(lines)
}

fn looks_like_header(fields: &[&str]) -> bool {
    fields.get(1).is_some_and(|stock| Decimal::from_str(stock).is_err())
}

fn parse_quantity(
    value: &str,
    field: &str,
    line_number: usize,
) -> Result<Decimal, InventoryParseError> {
    let parsed = Decimal::from_str(value).map_err(|_| InventoryParseError {
        line_number,
        reason: format!("{field} `{value}` is not a number"),
    })?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(InventoryParseError {
            line_number,
            reason: format!("{field} must not be negative"),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::parse_inventory;

    #[test]
    fn parses_rows_and_skips_header() {
        let lines = parse_inventory(
            "Item,Stock,Unit,Daily Usage,Price\nPaneer,2,kg,3,380\n\nOil,0.5,liters,5,150",
        )
        .expect("inventory should parse");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Paneer");
        assert_eq!(lines[1].current_stock, Decimal::new(5, 1));
        assert_eq!(lines[1].unit, "liters");
    }

    #[test]
    fn critical_stock_uses_usage_ratio() {
        let lines = parse_inventory("Oil,0.5,liters,5,150\nTomatoes,2,kg,6,60").expect("parse");
        let ratio = Decimal::new(2, 1);

        assert!(lines[0].is_critically_low(ratio));
        assert!(!lines[1].is_critically_low(ratio));
    }

    #[test]
    fn rejects_short_rows_with_line_number() {
        let error = parse_inventory("Paneer,2,kg,3,380\nOil,0.5,liters").expect_err("short row");
        assert_eq!(error.line_number, 2);
        assert!(error.reason.contains("expected 5 fields"));
    }

    #[test]
    fn rejects_negative_quantities() {
        let error = parse_inventory("Paneer,-2,kg,3,380").expect_err("negative stock");
        assert!(error.reason.contains("currentStock"));
    }
}
