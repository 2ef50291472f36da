//! Daily listening schedules
//!
//! A schedule names a start time and the weekdays it repeats on. Only the start
//! time drives activation; the end time is informational.
//!
//! Weekday indices follow the calendar convention used by the persisted state:
//! 0 = Sunday, 1 = Monday, ... 6 = Saturday.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest valid weekday index (Saturday)
pub const MAX_WEEKDAY: u8 = 6;

/// Wall-clock time of day at minute granularity, written `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidInput(format!(
                "time out of range: {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for ClockTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("expected HH:MM, got '{}'", s));

        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A repeating daily schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub start_time: ClockTime,
    /// Informational only, never used to stop playback
    pub end_time: ClockTime,
    pub enabled: bool,
    /// Sorted, de-duplicated weekday indices (0 = Sunday)
    pub repeat_days: Vec<u8>,
}

impl Schedule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start_time: ClockTime,
        end_time: ClockTime,
        repeat_days: impl IntoIterator<Item = u8>,
    ) -> Result<Self> {
        let mut days = Vec::new();
        for day in repeat_days {
            validate_day(day)?;
            if !days.contains(&day) {
                days.push(day);
            }
        }
        days.sort_unstable();

        Ok(Self {
            id: id.into(),
            name: name.into(),
            start_time,
            end_time,
            enabled: true,
            repeat_days: days,
        })
    }

    pub fn repeats_on(&self, day: u8) -> bool {
        self.repeat_days.contains(&day)
    }

    pub fn toggle_enabled(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn set_times(&mut self, start_time: ClockTime, end_time: ClockTime) {
        self.start_time = start_time;
        self.end_time = end_time;
    }

    /// Add the day if absent, remove it if present. The day list stays sorted.
    pub fn toggle_day(&mut self, day: u8) -> Result<()> {
        validate_day(day)?;
        if let Some(pos) = self.repeat_days.iter().position(|&d| d == day) {
            self.repeat_days.remove(pos);
        } else {
            self.repeat_days.push(day);
            self.repeat_days.sort_unstable();
        }
        Ok(())
    }
}

fn validate_day(day: u8) -> Result<()> {
    if day > MAX_WEEKDAY {
        return Err(Error::InvalidInput(format!(
            "weekday index {} out of range 0-{}",
            day, MAX_WEEKDAY
        )));
    }
    Ok(())
}

/// Locate a schedule by id for editing
pub fn find_schedule_mut<'a>(schedules: &'a mut [Schedule], id: &str) -> Result<&'a mut Schedule> {
    schedules
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| Error::NotFound(format!("schedule '{}'", id)))
}

/// Schedules installed on first launch: breakfast and lunch, Monday to Friday
pub fn default_schedules() -> Vec<Schedule> {
    let weekdays = [1, 2, 3, 4, 5];
    vec![
        Schedule {
            id: "1".to_string(),
            name: "早餐熏听".to_string(),
            start_time: ClockTime { hour: 7, minute: 0 },
            end_time: ClockTime { hour: 7, minute: 30 },
            enabled: true,
            repeat_days: weekdays.to_vec(),
        },
        Schedule {
            id: "2".to_string(),
            name: "午餐熏听".to_string(),
            start_time: ClockTime { hour: 12, minute: 0 },
            end_time: ClockTime { hour: 12, minute: 45 },
            enabled: true,
            repeat_days: weekdays.to_vec(),
        },
    ]
}
