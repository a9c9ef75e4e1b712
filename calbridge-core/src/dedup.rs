//! Duplicate collapse within one calendar.
//!
//! Backends occasionally store the same logical occurrence more than once
//! (retried writes, series copied both as master and as instances). Before
//! any cross-calendar comparison, each calendar is collapsed to one event
//! per `DedupKey`; the survivors feed the diff, the rest are deleted from
//! the backend they came from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::event::Event;
use crate::identity::DedupKey;

/// Result of a dedup run over one calendar's events.
pub struct DedupOutcome {
    /// One event per key, the most recently modified of its group.
    pub kept: Vec<Event>,
    /// Stale copies the caller should delete from the originating backend.
    pub duplicates: Vec<Event>,
}

/// Collapse events to one per `DedupKey`, keeping the latest modified.
///
/// A missing `last_modified` counts as "now" and therefore beats any
/// explicit timestamp, biasing the pass toward removing stale duplicates.
/// On equal timestamps the first-seen event survives.
pub fn dedupe(events: Vec<Event>) -> DedupOutcome {
    let now = Utc::now();
    let mut kept: Vec<Event> = Vec::new();
    let mut by_key: HashMap<DedupKey, usize> = HashMap::new();
    let mut duplicates = Vec::new();

    for event in events {
        let key = DedupKey::of(&event);
        match by_key.get(&key) {
            None => {
                by_key.insert(key, kept.len());
                kept.push(event);
            }
            Some(&index) => {
                if effective_modified(&event, now) > effective_modified(&kept[index], now) {
                    let stale = std::mem::replace(&mut kept[index], event);
                    duplicates.push(stale);
                } else {
                    duplicates.push(event);
                }
            }
        }
    }

    DedupOutcome { kept, duplicates }
}

fn effective_modified(event: &Event, now: DateTime<Utc>) -> DateTime<Utc> {
    event.last_modified.unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use chrono::TimeZone;

    fn stored(uid: &str, modified: Option<DateTime<Utc>>) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        Event {
            uid: uid.to_string(),
            summary: "Standup".to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(start + chrono::Duration::hours(1)),
            status: EventStatus::Confirmed,
            recurrence: None,
            recurrence_id: None,
            last_modified: modified,
            raw: None,
        }
    }

    #[test]
    fn test_keeps_latest_modified_and_deletes_the_rest() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let outcome = dedupe(vec![stored("old", Some(t1)), stored("new", Some(t2))]);

        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].uid, "new");
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].uid, "old");
    }

    #[test]
    fn test_order_does_not_change_the_survivor() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let outcome = dedupe(vec![stored("new", Some(t2)), stored("old", Some(t1))]);

        assert_eq!(outcome.kept[0].uid, "new");
        assert_eq!(outcome.duplicates[0].uid, "old");
    }

    #[test]
    fn test_missing_timestamp_beats_explicit_one() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let outcome = dedupe(vec![stored("dated", Some(t1)), stored("undated", None)]);

        assert_eq!(outcome.kept[0].uid, "undated");
        assert_eq!(outcome.duplicates[0].uid, "dated");
    }

    #[test]
    fn test_distinct_keys_are_untouched() {
        let mut other = stored("other", None);
        other.summary = "Retro".to_string();

        let outcome = dedupe(vec![stored("a", None), other]);

        assert_eq!(outcome.kept.len(), 2);
        assert!(outcome.duplicates.is_empty());
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let outcome = dedupe(vec![stored("first", None), stored("second", None)]);

        assert_eq!(outcome.kept[0].uid, "first");
        assert_eq!(outcome.duplicates[0].uid, "second");
    }
}
