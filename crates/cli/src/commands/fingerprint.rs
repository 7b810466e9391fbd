use crate::commands::{read_inventory, CommandResult};
use restock_core::calendar::{Clock, ContextDeriver, SystemClock};
use restock_core::canonical::{check_caller_horizon, Canonicalizer};
use restock_core::config::{AppConfig, LoadOptions};
use serde_json::json;

/// Canonicalizes the request exactly as `plan` would, without touching the
/// cache or the reasoning engine.
pub fn run(inventory: &str, instruction: &str, horizon_days: u32) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "fingerprint",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    if let Err(error) = check_caller_horizon(horizon_days) {
        return CommandResult::failure("fingerprint", error.class(), error.to_string(), 6);
    }
    let inventory_text = match read_inventory(inventory) {
        Ok(text) => text,
        Err(message) => return CommandResult::failure("fingerprint", "input_read", message, 6),
    };

    let clock = SystemClock::from_offset_minutes(config.calendar.utc_offset_minutes);
    let context =
        ContextDeriver::new(config.calendar.events.clone()).derive(clock.now(), horizon_days);
    let canonicalizer = Canonicalizer::new(config.planning.min_inventory_chars);

    match canonicalizer.canonicalize(&inventory_text, instruction, context, horizon_days) {
        Ok((request, fingerprint)) => CommandResult::success_with_data(
            "fingerprint",
            format!("fingerprint {}", fingerprint.short()),
            json!({
                "fingerprint": fingerprint,
                "inventoryLines": request.lines.len(),
                "calendarContext": request.calendar_context,
            }),
        ),
        Err(error) => CommandResult::failure("fingerprint", error.class(), error.to_string(), 6),
    }
}
