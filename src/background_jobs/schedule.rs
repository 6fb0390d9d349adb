//! Weekly recurrence in a fixed UTC offset.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc, Weekday,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    time: NaiveTime,
    utc_offset: FixedOffset,
}

impl WeeklySchedule {
    /// Returns `None` when `hour` or `minute` is out of range.
    pub fn new(weekday: Weekday, hour: u32, minute: u32, utc_offset: FixedOffset) -> Option<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self {
            weekday,
            time,
            utc_offset,
        })
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = after.with_timezone(&self.utc_offset).date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - local_date.weekday().num_days_from_monday())
            % 7;
        let local = (local_date + Duration::days(days_ahead as i64)).and_time(self.time);
        let candidate = Utc.from_utc_datetime(
            &(local - Duration::seconds(self.utc_offset.local_minus_utc() as i64)),
        );
        if candidate > after {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }
}

impl std::fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.weekday,
            self.time.format("%H:%M"),
            self.utc_offset
        )
    }
}
