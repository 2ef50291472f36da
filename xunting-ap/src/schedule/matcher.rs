//! Schedule evaluation
//!
//! A schedule matches a moment when it is enabled, repeats on the moment's
//! weekday, and its start time equals the moment's local `HH:MM` (seconds are
//! ignored). The end time plays no part.

use chrono::NaiveDateTime;
use xunting_common::time::{hour_minute, weekday_index};
use xunting_common::Schedule;

pub fn schedule_matches(schedule: &Schedule, moment: &NaiveDateTime) -> bool {
    if !schedule.enabled || !schedule.repeats_on(weekday_index(moment)) {
        return false;
    }
    let (hour, minute) = hour_minute(moment);
    schedule.start_time.hour() == hour && schedule.start_time.minute() == minute
}

/// First matching schedule in list order
pub fn find_matching_schedule<'a>(
    schedules: &'a [Schedule],
    moment: &NaiveDateTime,
) -> Option<&'a Schedule> {
    schedules.iter().find(|s| schedule_matches(s, moment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use xunting_common::ClockTime;

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        // June 2024: the 3rd is a Monday, the 8th a Saturday
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn breakfast() -> Schedule {
        Schedule::new(
            "1",
            "早餐熏听",
            ClockTime::new(7, 0).unwrap(),
            ClockTime::new(7, 30).unwrap(),
            [1, 2, 3, 4, 5],
        )
        .unwrap()
    }

    #[test]
    fn test_matches_on_weekday_start_minute() {
        assert!(schedule_matches(&breakfast(), &at(3, 7, 0, 0)));
        assert!(schedule_matches(&breakfast(), &at(3, 7, 0, 59)));
    }

    #[test]
    fn test_no_match_other_minute() {
        assert!(!schedule_matches(&breakfast(), &at(3, 7, 1, 0)));
        assert!(!schedule_matches(&breakfast(), &at(3, 6, 59, 59)));
        // End time is informational
        assert!(!schedule_matches(&breakfast(), &at(3, 7, 30, 0)));
    }

    #[test]
    fn test_no_match_on_weekend() {
        assert!(!schedule_matches(&breakfast(), &at(8, 7, 0, 0)));
        assert!(!schedule_matches(&breakfast(), &at(9, 7, 0, 0)));
    }

    #[test]
    fn test_disabled_never_matches() {
        let mut schedule = breakfast();
        schedule.toggle_enabled();
        assert!(!schedule_matches(&schedule, &at(3, 7, 0, 0)));
    }

    #[test]
    fn test_first_match_wins() {
        let mut second = breakfast();
        second.id = "2".to_string();
        let schedules = vec![breakfast(), second];
        assert_eq!(
            find_matching_schedule(&schedules, &at(4, 7, 0, 10)).map(|s| s.id.as_str()),
            Some("1")
        );
        assert!(find_matching_schedule(&schedules, &at(4, 12, 0, 0)).is_none());
        assert!(find_matching_schedule(&[], &at(4, 7, 0, 0)).is_none());
    }
}
