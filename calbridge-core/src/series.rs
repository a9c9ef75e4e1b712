//! Grouping events into series.

use std::collections::BTreeMap;

use tracing::warn;

use crate::event::Event;

/// All events sharing a uid within one calendar: an optional recurring
/// master plus concrete occurrences (expanded instances and overrides).
#[derive(Debug, Clone)]
pub struct EventSeries {
    pub uid: String,
    pub summary: String,
    /// The instance carrying the rule and no override marker. At most one
    /// per series per calendar.
    pub master: Option<Event>,
    /// Concrete occurrences, ordered by start.
    pub instances: Vec<Event>,
    /// Verbatim backend payload of the master, kept so a series copied to
    /// another backend is not rebuilt lossily from instances.
    pub original_payload: Option<serde_json::Value>,
}

impl EventSeries {
    fn new(uid: &str, summary: &str) -> Self {
        EventSeries {
            uid: uid.to_string(),
            summary: summary.to_string(),
            master: None,
            instances: Vec::new(),
            original_payload: None,
        }
    }
}

/// Group series members (events with a rule or an override marker) by uid.
/// Singleton events are not series and are skipped.
pub fn collect_series(events: &[Event]) -> BTreeMap<String, EventSeries> {
    let mut series: BTreeMap<String, EventSeries> = BTreeMap::new();

    for event in events {
        if !event.is_series_member() {
            continue;
        }

        let entry = series
            .entry(event.uid.clone())
            .or_insert_with(|| EventSeries::new(&event.uid, &event.summary));

        if event.is_series_master() {
            if entry.master.is_some() {
                // Invariant: one master per series per calendar. Keep the
                // first and treat the rest as instances.
                warn!(uid = %event.uid, "series has more than one master event");
                entry.instances.push(event.clone());
            } else {
                entry.original_payload = event.raw.clone();
                entry.master = Some(event.clone());
            }
        } else {
            entry.instances.push(event.clone());
        }
    }

    for entry in series.values_mut() {
        entry.instances.sort_by_key(|e| e.start.to_utc());
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use crate::recurrence::RecurrenceRule;
    use chrono::{TimeZone, Utc};

    fn member(uid: &str, day: u32, master: bool) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
        Event {
            uid: uid.to_string(),
            summary: "Jour Fixe".to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(start + chrono::Duration::hours(1)),
            status: EventStatus::Confirmed,
            recurrence: master.then(|| RecurrenceRule::Raw("FREQ=WEEKLY;BYDAY=MO".to_string())),
            recurrence_id: (!master).then(|| EventTime::DateTime(start)),
            last_modified: None,
            raw: master.then(|| serde_json::json!({"ical": "BEGIN:VEVENT..."})),
        }
    }

    fn singleton(uid: &str) -> Event {
        Event {
            recurrence: None,
            recurrence_id: None,
            raw: None,
            ..member(uid, 1, true)
        }
    }

    #[test]
    fn test_groups_by_uid_and_finds_master() {
        let events = vec![
            member("s1", 10, false),
            member("s1", 3, false),
            member("s1", 1, true),
            member("s2", 5, false),
        ];

        let series = collect_series(&events);
        assert_eq!(series.len(), 2);

        let s1 = &series["s1"];
        assert!(s1.master.is_some());
        assert!(s1.original_payload.is_some());
        assert_eq!(s1.instances.len(), 2);
        // Ordered by start.
        assert!(s1.instances[0].start.to_utc() < s1.instances[1].start.to_utc());

        let s2 = &series["s2"];
        assert!(s2.master.is_none());
        assert!(s2.original_payload.is_none());
    }

    #[test]
    fn test_singletons_are_not_series() {
        let series = collect_series(&[singleton("plain-1")]);
        assert!(series.is_empty());
    }

    #[test]
    fn test_second_master_is_demoted_to_instance() {
        let events = vec![member("s1", 1, true), member("s1", 8, true)];

        let series = collect_series(&events);
        let s1 = &series["s1"];
        assert_eq!(s1.master.as_ref().unwrap().start, events[0].start);
        assert_eq!(s1.instances.len(), 1);
    }
}
