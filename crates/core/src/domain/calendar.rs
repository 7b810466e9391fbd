use std::collections::BTreeSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Calendar facts observed once per request. Field order is part of the
/// fingerprint encoding and must not be rearranged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarContext {
    pub date_label: String,
    pub weekday: Weekday,
    pub is_weekend: bool,
    pub detected_events: BTreeSet<String>,
    pub horizon_days: u32,
}

impl CalendarContext {
    /// Friday through Sunday.
    pub fn in_weekend_rush_window(&self) -> bool {
        matches!(self.weekday, Weekday::Fri | Weekday::Sat | Weekday::Sun)
    }

    pub fn has_detected_events(&self) -> bool {
        !self.detected_events.is_empty()
    }
}
