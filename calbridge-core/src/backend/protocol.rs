//! Backend provider protocol types.
//!
//! Defines the JSON protocol spoken between the engine and provider
//! binaries over stdin/stdout. The protocol is language-agnostic: any
//! executable that speaks it can serve a backend. Providers own the wire
//! format of their service (CalDAV, REST) and all credential handling;
//! the engine only ever sees these types.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::{Event, EventStatus, EventTime};
use crate::recurrence::RecurrenceRule;

/// Commands that providers must implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListCalendars,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Request sent from the engine to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Failure class reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network trouble or a 5xx: retry at the next scheduled pass.
    Transient,
    /// A 4xx other than not-found: skip the event, do not retry.
    Permanent,
    /// The addressed record does not exist.
    NotFound,
}

fn default_error_kind() -> ErrorKind {
    ErrorKind::Permanent
}

/// Response sent from a provider to the engine.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        #[serde(default = "default_error_kind")]
        kind: ErrorKind,
    },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> String {
        serde_json::to_string(&Response::Success { data }).unwrap()
    }
}

impl Response<()> {
    pub fn error(msg: &str, kind: ErrorKind) -> String {
        serde_json::to_string(&Response::<()>::Error {
            error: msg.to_string(),
            kind,
        })
        .unwrap()
    }
}

/// A calendar as reported by a provider's `list_calendars`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
}

/// Event as it crosses the provider boundary.
///
/// Looser than [`Event`]: the end may be missing and the recurrence rule
/// is an opaque string. [`WireEvent::into_event`] normalizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    #[serde(default)]
    pub cancelled: bool,
    pub recurrence_rule: Option<String>,
    pub recurrence_id: Option<EventTime>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    /// Backend-native payload, passed back verbatim on writes so a
    /// normalized view never overwrites what the backend actually stores.
    pub raw: Option<serde_json::Value>,
}

impl WireEvent {
    /// Normalize into the engine's event type.
    ///
    /// A missing end becomes start + 1 hour (timed) or the next day
    /// (all-day) — for matching only; the raw payload keeps the backend's
    /// own record for writes. Events whose slot runs backwards are
    /// dropped with a warning rather than corrupting comparisons
    /// downstream.
    pub fn into_event(self) -> Option<Event> {
        let end = match self.end {
            Some(end) => end,
            None => match &self.start {
                EventTime::DateTime(dt) => EventTime::DateTime(*dt + chrono::Duration::hours(1)),
                EventTime::Date(d) => EventTime::Date(d.succ_opt()?),
            },
        };

        let event = Event {
            uid: self.uid,
            summary: self.summary,
            description: self.description,
            location: self.location,
            start: self.start,
            end,
            status: if self.cancelled {
                EventStatus::Cancelled
            } else {
                EventStatus::Confirmed
            },
            recurrence: self.recurrence_rule.map(RecurrenceRule::Raw),
            recurrence_id: self.recurrence_id,
            last_modified: self.last_modified,
            raw: self.raw,
        };

        if !event.has_valid_slot() {
            warn!(uid = %event.uid, "event slot runs backwards, skipping");
            return None;
        }

        Some(event)
    }
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        WireEvent {
            uid: event.uid.clone(),
            summary: event.summary.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start: event.start.clone(),
            end: Some(event.end.clone()),
            cancelled: event.status == EventStatus::Cancelled,
            recurrence_rule: event.recurrence.as_ref().map(|r| r.to_string()),
            recurrence_id: event.recurrence_id.clone(),
            last_modified: event.last_modified,
            raw: event.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn wire(start: EventTime, end: Option<EventTime>) -> WireEvent {
        WireEvent {
            uid: "w1".to_string(),
            summary: "Planning".to_string(),
            description: None,
            location: None,
            start,
            end,
            cancelled: false,
            recurrence_rule: None,
            recurrence_id: None,
            last_modified: None,
            raw: None,
        }
    }

    #[test]
    fn test_missing_end_synthesizes_one_hour_for_timed_events() {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        let event = wire(EventTime::DateTime(start), None).into_event().unwrap();
        assert_eq!(
            event.end,
            EventTime::DateTime(start + chrono::Duration::hours(1))
        );
    }

    #[test]
    fn test_missing_end_synthesizes_next_day_for_all_day_events() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let event = wire(EventTime::Date(date), None).into_event().unwrap();
        assert_eq!(event.end, EventTime::Date(date.succ_opt().unwrap()));
    }

    #[test]
    fn test_backwards_slot_is_dropped() {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        let earlier = EventTime::DateTime(start - chrono::Duration::hours(2));
        assert!(
            wire(EventTime::DateTime(start), Some(earlier))
                .into_event()
                .is_none()
        );
    }

    #[test]
    fn test_opaque_rule_survives_the_boundary() {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        let mut w = wire(EventTime::DateTime(start), None);
        w.recurrence_rule = Some("FREQ=MONTHLY;BYDAY=2FR".to_string());

        let event = w.into_event().unwrap();
        assert_eq!(
            event.recurrence,
            Some(RecurrenceRule::Raw("FREQ=MONTHLY;BYDAY=2FR".to_string()))
        );

        let back = WireEvent::from(&event);
        assert_eq!(back.recurrence_rule.as_deref(), Some("FREQ=MONTHLY;BYDAY=2FR"));
    }

    #[test]
    fn test_error_response_defaults_to_permanent() {
        let parsed: Response<()> =
            serde_json::from_str(r#"{"status":"error","error":"boom"}"#).unwrap();
        match parsed {
            Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::Permanent),
            Response::Success { .. } => panic!("expected error"),
        }
    }
}
