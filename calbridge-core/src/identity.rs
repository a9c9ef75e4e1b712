//! Derived event identity.
//!
//! Two stored events sharing a `DedupKey` are the same logical occurrence;
//! two events sharing a uid belong to the same series. Keys are derived on
//! demand, never persisted.

use crate::event::Event;

/// Comparison key deciding whether two stored events represent one
/// logical occurrence.
///
/// Series members are keyed by uid, summary and occurrence (the override
/// marker for instance exceptions, a fixed tag for the master), since a
/// series repeats the same slot-level content across occurrences.
/// Singletons are keyed by their full visible content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Series {
        uid: String,
        summary: String,
        occurrence: String,
    },
    Slot {
        summary: String,
        start: String,
        end: String,
        location: String,
        description: String,
    },
}

impl DedupKey {
    pub fn of(event: &Event) -> DedupKey {
        if event.is_series_member() {
            let occurrence = event
                .recurrence_id
                .as_ref()
                .map(|t| t.canonical_string())
                .unwrap_or_else(|| "master".to_string());
            DedupKey::Series {
                uid: event.uid.clone(),
                summary: event.summary.clone(),
                occurrence,
            }
        } else {
            DedupKey::Slot {
                summary: event.summary.clone(),
                start: event.start.canonical_string(),
                end: event.end.canonical_string(),
                location: event.location.clone().unwrap_or_default(),
                description: event.description.clone().unwrap_or_default(),
            }
        }
    }
}

/// DedupKey equality.
pub fn is_same_occurrence(a: &Event, b: &Event) -> bool {
    DedupKey::of(a) == DedupKey::of(b)
}

/// Uid equality.
pub fn is_same_series(a: &Event, b: &Event) -> bool {
    a.uid == b.uid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use crate::recurrence::RecurrenceRule;
    use chrono::{TimeZone, Utc};

    fn singleton(summary: &str, uid: &str) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        Event {
            uid: uid.to_string(),
            summary: summary.to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(start + chrono::Duration::hours(1)),
            status: EventStatus::Confirmed,
            recurrence: None,
            recurrence_id: None,
            last_modified: None,
            raw: None,
        }
    }

    #[test]
    fn test_singletons_match_on_content_not_uid() {
        // Backends assign different uids to the same imported event; the
        // slot key sees through that.
        let a = singleton("Standup", "uid-a");
        let b = singleton("Standup", "uid-b");
        assert!(is_same_occurrence(&a, &b));
        assert!(!is_same_series(&a, &b));
    }

    #[test]
    fn test_singleton_location_distinguishes() {
        let a = singleton("Standup", "uid-a");
        let mut b = singleton("Standup", "uid-a");
        b.location = Some("Room 2".to_string());
        assert!(!is_same_occurrence(&a, &b));
    }

    #[test]
    fn test_series_members_match_on_occurrence() {
        let occurrence = EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap());
        let mut a = singleton("Jour Fixe", "series-1");
        a.recurrence_id = Some(occurrence.clone());
        let mut b = singleton("Jour Fixe", "series-1");
        b.recurrence_id = Some(occurrence);
        // Same override instance stored twice, differing description.
        b.description = Some("agenda attached".to_string());
        assert!(is_same_occurrence(&a, &b));
    }

    #[test]
    fn test_series_master_and_override_are_distinct() {
        let mut master = singleton("Jour Fixe", "series-1");
        master.recurrence = Some(RecurrenceRule::Raw("FREQ=WEEKLY;BYDAY=MO".to_string()));
        let mut instance = singleton("Jour Fixe", "series-1");
        instance.recurrence_id = Some(master.start.clone());
        assert!(!is_same_occurrence(&master, &instance));
        assert!(is_same_series(&master, &instance));
    }
}
