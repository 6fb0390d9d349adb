//! Ranking week window.
//!
//! A week runs from Monday 00:00 (inclusive) to the following Monday 00:00
//! (exclusive), evaluated in the deployment's UTC offset.

use crate::catalog_store::to_db_timestamp;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    monday: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl WeekWindow {
    /// The week containing `instant` as seen from `offset`.
    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local_date = instant.with_timezone(&offset).date_naive();
        let monday =
            local_date - Duration::days(local_date.weekday().num_days_from_monday() as i64);
        let local_midnight = monday.and_time(NaiveTime::MIN);
        let start = Utc.from_utc_datetime(
            &(local_midnight - Duration::seconds(offset.local_minus_utc() as i64)),
        );
        Self {
            monday,
            start,
            end: start + Duration::weeks(1),
        }
    }

    /// Local date of the Monday that opens the week.
    pub fn week_start(&self) -> NaiveDate {
        self.monday
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Window bounds formatted like stored rating timestamps, so they can be
    /// compared directly in SQL.
    pub fn db_bounds(&self) -> (String, String) {
        (to_db_timestamp(self.start), to_db_timestamp(self.end))
    }
}

/// Formats a week start the way it is stored in the snapshot.
pub fn format_week_start(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_week_start(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
