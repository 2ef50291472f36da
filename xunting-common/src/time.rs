//! Timestamp and wall-clock utilities

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local wall-clock time, as schedules are written in local time
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Weekday index of a moment, 0 = Sunday ... 6 = Saturday
pub fn weekday_index(moment: &NaiveDateTime) -> u8 {
    moment.weekday().num_days_from_sunday() as u8
}

/// Hour and minute of a moment
pub fn hour_minute(moment: &NaiveDateTime) -> (u8, u8) {
    (moment.hour() as u8, moment.minute() as u8)
}

/// Key identifying the calendar minute a moment falls in
///
/// Two moments share a key exactly when they have the same date, hour and minute.
pub fn minute_key(moment: &NaiveDateTime) -> i64 {
    moment.and_utc().timestamp().div_euclid(60)
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}
