//! Backend-neutral event types.
//!
//! These types represent calendar events in a backend-agnostic way.
//! Backend adapters convert their native payloads into these types, and
//! the reconciliation engine works exclusively with them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

/// A calendar event (backend-neutral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Backend-assigned or synthesized identifier.
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub status: EventStatus,

    /// Recurrence rule for master events.
    pub recurrence: Option<RecurrenceRule>,
    /// Original occurrence time for override instances (RECURRENCE-ID).
    pub recurrence_id: Option<EventTime>,

    /// Last modification timestamp, if the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,

    /// Verbatim backend-native payload, retained for pass-through writes.
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Confirmed,
    Cancelled,
}

impl EventTime {
    /// UTC instant for ordering and window checks. All-day dates map to
    /// midnight UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => d.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc(),
        }
    }

    /// Stable textual form used in derived identity keys.
    pub fn canonical_string(&self) -> String {
        match self {
            EventTime::DateTime(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
        }
    }
}

impl Event {
    /// All-day events carry calendar dates; timed events carry zoned
    /// timestamps. The two never mix within one event.
    pub fn is_all_day(&self) -> bool {
        matches!(self.start, EventTime::Date(_))
    }

    /// Whether this event belongs to a series: it either carries the
    /// series rule (master) or an override marker (instance exception).
    pub fn is_series_member(&self) -> bool {
        self.recurrence.is_some() || self.recurrence_id.is_some()
    }

    /// Master events carry the rule and no override marker.
    pub fn is_series_master(&self) -> bool {
        self.recurrence.is_some() && self.recurrence_id.is_none()
    }

    /// Field-level equality over the replaceable content of an event:
    /// summary, start, end, description, location, and all-day-ness.
    /// Everything else (recurrence, raw payload, bookkeeping) is excluded.
    pub fn content_matches(&self, other: &Event) -> bool {
        self.summary == other.summary
            && self.start == other.start
            && self.end == other.end
            && self.description == other.description
            && self.location == other.location
            && self.is_all_day() == other.is_all_day()
    }

    /// Slot validity: start must not come after end.
    pub fn has_valid_slot(&self) -> bool {
        self.start.to_utc() <= self.end.to_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timed(h: u32) -> EventTime {
        EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, h, 0, 0).unwrap())
    }

    fn event(summary: &str) -> Event {
        Event {
            uid: "e1".to_string(),
            summary: summary.to_string(),
            description: None,
            location: None,
            start: timed(9),
            end: timed(10),
            status: EventStatus::Confirmed,
            recurrence: None,
            recurrence_id: None,
            last_modified: None,
            raw: None,
        }
    }

    #[test]
    fn test_all_day_is_derived_from_start_variant() {
        let mut e = event("Standup");
        assert!(!e.is_all_day());

        e.start = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        e.end = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
        assert!(e.is_all_day());
    }

    #[test]
    fn test_content_matches_ignores_bookkeeping_fields() {
        let a = event("Standup");
        let mut b = a.clone();
        b.uid = "other-uid".to_string();
        b.last_modified = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        b.raw = Some(serde_json::json!({"etag": "abc"}));
        assert!(a.content_matches(&b));

        b.summary = "Renamed".to_string();
        assert!(!a.content_matches(&b));
    }

    #[test]
    fn test_all_day_and_timed_slots_never_compare_equal() {
        let timed = event("Offsite");
        let mut all_day = timed.clone();
        all_day.start = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        all_day.end = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
        assert!(!timed.content_matches(&all_day));
    }

    #[test]
    fn test_slot_validity() {
        let mut e = event("Backwards");
        assert!(e.has_valid_slot());
        e.end = timed(8);
        assert!(!e.has_valid_slot());
    }
}
