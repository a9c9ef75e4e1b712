//! Recurrence rule inference for series without an explicit rule.
//!
//! Some backends deliver a recurring series only as discrete instances,
//! with the master's rule lost in translation. When such a series has to
//! be recreated on the other side, the engine infers a probable rule from
//! the instance pattern. This is best-effort: an explicit rule found on
//! any instance is always returned verbatim and never overwritten.

use std::collections::BTreeMap;

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Minimum number of occurrences on the same weekday / day-of-month
/// before a pattern counts as recurring.
const MIN_PATTERN_COUNT: usize = 2;

/// A recurrence rule descriptor.
///
/// `Raw` carries a backend-provided rule verbatim (opaque to the engine);
/// the structured variants are produced by inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecurrenceRule {
    Raw(String),
    Weekly { days: Vec<Weekday> },
    Monthly { days: Vec<u32> },
}

impl std::fmt::Display for RecurrenceRule {
    /// RFC 5545 RRULE text.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceRule::Raw(rule) => write!(f, "{}", rule),
            RecurrenceRule::Weekly { days } => {
                let byday: Vec<&str> = days.iter().map(|d| byday_code(*d)).collect();
                write!(f, "FREQ=WEEKLY;BYDAY={}", byday.join(","))
            }
            RecurrenceRule::Monthly { days } => {
                let bymonthday: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                write!(f, "FREQ=MONTHLY;BYMONTHDAY={}", bymonthday.join(","))
            }
        }
    }
}

fn byday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Infer a recurrence rule from a set of instances sharing a uid.
///
/// Policy, in order:
/// 1. an explicit rule on any instance is authoritative and returned as-is;
/// 2. any weekday occurring at least twice yields a weekly rule on the set
///    of such weekdays;
/// 3. any day-of-month occurring at least twice yields a monthly rule;
/// 4. otherwise `None` — the series stays a set of discrete instances.
pub fn infer_rule(instances: &[Event]) -> Option<RecurrenceRule> {
    if instances.is_empty() {
        return None;
    }

    if let Some(rule) = instances.iter().find_map(|e| e.recurrence.clone()) {
        return Some(rule);
    }

    let mut starts: Vec<_> = instances.iter().map(|e| e.start.to_utc()).collect();
    starts.sort();

    // BTreeMap keeps the day sets in deterministic order.
    let mut weekdays: BTreeMap<u32, usize> = BTreeMap::new();
    for start in &starts {
        *weekdays.entry(start.weekday().num_days_from_monday()).or_default() += 1;
    }
    let recurring: Vec<Weekday> = weekdays
        .iter()
        .filter(|(_, count)| **count >= MIN_PATTERN_COUNT)
        .filter_map(|(day, _)| weekday_from_offset(*day))
        .collect();
    if !recurring.is_empty() {
        return Some(RecurrenceRule::Weekly { days: recurring });
    }

    let mut month_days: BTreeMap<u32, usize> = BTreeMap::new();
    for start in &starts {
        *month_days.entry(start.day()).or_default() += 1;
    }
    let recurring: Vec<u32> = month_days
        .iter()
        .filter(|(_, count)| **count >= MIN_PATTERN_COUNT)
        .map(|(day, _)| *day)
        .collect();
    if !recurring.is_empty() {
        return Some(RecurrenceRule::Monthly { days: recurring });
    }

    None
}

fn weekday_from_offset(days_from_monday: u32) -> Option<Weekday> {
    match days_from_monday {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn instance_on(year: i32, month: u32, day: u32) -> Event {
        let start = Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap();
        Event {
            uid: "series-1".to_string(),
            summary: "Jour Fixe".to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(start + chrono::Duration::hours(1)),
            status: EventStatus::Confirmed,
            recurrence: None,
            recurrence_id: Some(EventTime::DateTime(start)),
            last_modified: None,
            raw: None,
        }
    }

    #[test]
    fn test_existing_rule_is_returned_verbatim() {
        let mut with_rule = instance_on(2024, 1, 8);
        with_rule.recurrence = Some(RecurrenceRule::Raw("FREQ=MONTHLY;BYDAY=2FR".to_string()));
        let instances = vec![instance_on(2024, 1, 1), with_rule, instance_on(2024, 1, 15)];

        assert_eq!(
            infer_rule(&instances),
            Some(RecurrenceRule::Raw("FREQ=MONTHLY;BYDAY=2FR".to_string()))
        );
    }

    #[test]
    fn test_three_mondays_yield_weekly_rule() {
        // 2024-01-01, -08, -15 are consecutive Mondays.
        let instances = vec![
            instance_on(2024, 1, 1),
            instance_on(2024, 1, 8),
            instance_on(2024, 1, 15),
        ];

        assert_eq!(
            infer_rule(&instances),
            Some(RecurrenceRule::Weekly {
                days: vec![Weekday::Mon]
            })
        );
    }

    #[test]
    fn test_same_day_of_month_yields_monthly_rule() {
        // Jan 10 2024 is a Wednesday, Feb 10 2024 a Saturday: no weekday
        // repetition, so the monthly grouping applies.
        let instances = vec![instance_on(2024, 1, 10), instance_on(2024, 2, 10)];

        assert_eq!(
            infer_rule(&instances),
            Some(RecurrenceRule::Monthly { days: vec![10] })
        );
    }

    #[test]
    fn test_irregular_instances_yield_none() {
        // Distinct weekdays and distinct days of month.
        let instances = vec![instance_on(2024, 1, 10), instance_on(2024, 2, 24)];
        assert_eq!(infer_rule(&instances), None);
    }

    #[test]
    fn test_empty_and_single_instance_yield_none() {
        assert_eq!(infer_rule(&[]), None);
        assert_eq!(infer_rule(&[instance_on(2024, 1, 10)]), None);
    }

    #[test]
    fn test_weekly_takes_precedence_over_monthly() {
        // Two Wednesdays that also share a day-of-month pattern with a
        // third instance; the weekday rule wins.
        let instances = vec![
            instance_on(2024, 1, 10),
            instance_on(2024, 1, 17),
            instance_on(2024, 2, 10),
        ];

        assert_eq!(
            infer_rule(&instances),
            Some(RecurrenceRule::Weekly {
                days: vec![Weekday::Wed]
            })
        );
    }

    #[test]
    fn test_all_day_instances_participate_in_inference() {
        let day = |d: u32| {
            let date = NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
            Event {
                start: EventTime::Date(date),
                end: EventTime::Date(date.succ_opt().unwrap()),
                ..instance_on(2024, 1, d)
            }
        };
        // Two all-day Mondays.
        let instances = vec![day(1), day(8)];
        assert_eq!(
            infer_rule(&instances),
            Some(RecurrenceRule::Weekly {
                days: vec![Weekday::Mon]
            })
        );
    }

    #[test]
    fn test_rrule_rendering() {
        let weekly = RecurrenceRule::Weekly {
            days: vec![Weekday::Mon, Weekday::Wed],
        };
        assert_eq!(weekly.to_string(), "FREQ=WEEKLY;BYDAY=MO,WE");

        let monthly = RecurrenceRule::Monthly { days: vec![10, 24] };
        assert_eq!(monthly.to_string(), "FREQ=MONTHLY;BYMONTHDAY=10,24");
    }
}
