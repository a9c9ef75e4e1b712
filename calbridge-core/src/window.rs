//! Sync window for fetching events.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Days of history included in a default window.
pub const WINDOW_PAST_DAYS: i64 = 7;
/// Days of lookahead included in a default window.
pub const WINDOW_FUTURE_DAYS: i64 = 30;

/// Half-open time window over which events are listed and reconciled.
#[derive(Debug, Clone)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Default for SyncWindow {
    /// Default window: now−7d … now+30d.
    fn default() -> Self {
        let now = Utc::now();
        SyncWindow {
            start: now - Duration::days(WINDOW_PAST_DAYS),
            end: now + Duration::days(WINDOW_FUTURE_DAYS),
        }
    }
}

impl SyncWindow {
    /// Parse window bounds from CLI arguments (YYYY-MM-DD, inclusive days).
    /// Missing bounds fall back to the defaults.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let defaults = SyncWindow::default();

        let start = match from {
            Some(s) => parse_date(s)?.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc(),
            None => defaults.start,
        };
        let end = match to {
            Some(s) => parse_date(s)?
                .and_hms_opt(23, 59, 59)
                .expect("end of day is valid")
                .and_utc(),
            None => defaults.end,
        };

        if start > end {
            return Err(format!("window starts after it ends ({} > {})", start, end));
        }

        Ok(SyncWindow { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_spans_past_week_to_next_month() {
        let window = SyncWindow::default();
        let span = window.end - window.start;
        assert_eq!(span.num_days(), WINDOW_PAST_DAYS + WINDOW_FUTURE_DAYS);
        assert!(window.contains(Utc::now()));
    }

    #[test]
    fn test_from_args_parses_bounds() {
        let window = SyncWindow::from_args(Some("2025-01-01"), Some("2025-02-01")).unwrap();
        assert_eq!(window.start.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2025-02-01T23:59:59+00:00");
    }

    #[test]
    fn test_from_args_rejects_inverted_and_malformed_bounds() {
        assert!(SyncWindow::from_args(Some("2025-02-01"), Some("2025-01-01")).is_err());
        assert!(SyncWindow::from_args(Some("01.02.2025"), None).is_err());
    }
}
