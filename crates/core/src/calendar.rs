use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::calendar::CalendarContext;

/// Upper bound on days scanned for events, independent of the requested horizon.
const MAX_EVENT_SCAN_DAYS: u32 = 31;

/// Recurring calendar date that drives demand well above normal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub month: u32,
    pub day: u32,
    pub name: String,
}

impl CalendarEvent {
    pub fn new(month: u32, day: u32, name: impl Into<String>) -> Self {
        Self { month, day, name: name.into() }
    }

    fn falls_on(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

pub fn default_events() -> Vec<CalendarEvent> {
    vec![
        CalendarEvent::new(1, 1, "New Year's Day"),
        CalendarEvent::new(2, 14, "Valentine's Day"),
        CalendarEvent::new(12, 24, "Christmas Eve"),
        CalendarEvent::new(12, 25, "Christmas Day"),
        CalendarEvent::new(12, 31, "New Year's Eve"),
    ]
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock observed at a fixed UTC offset.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Falls back to UTC for offsets outside +/-24h.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock pinned to one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct ContextDeriver {
    events: Vec<CalendarEvent>,
}

impl Default for ContextDeriver {
    fn default() -> Self {
        Self { events: default_events() }
    }
}

impl ContextDeriver {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn derive(&self, now: DateTime<FixedOffset>, horizon_days: u32) -> CalendarContext {
        let today = now.date_naive();
        let weekday = today.weekday();

        CalendarContext {
            date_label: today.format("%A, %d %B %Y").to_string(),
            weekday,
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            detected_events: self.detect_events(today, horizon_days),
            horizon_days,
        }
    }

    fn detect_events(&self, today: NaiveDate, horizon_days: u32) -> BTreeSet<String> {
        let window = horizon_days.clamp(1, MAX_EVENT_SCAN_DAYS);
        let mut detected = BTreeSet::new();

        for offset in 0..window {
            let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            for event in self.events.iter().filter(|event| event.falls_on(date)) {
                detected.insert(event.name.clone());
            }
        }

        detected
    }
}
