//! Test helper modules for Xunting reader integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeOutput: output backend whose rendering the test drives by hand
//! - ScriptedSpeech: speech client replaying scripted results
//! - ManualClock: wall clock the test can set

#![allow(dead_code)]

pub mod fake_output;
pub mod scripted_speech;

pub use fake_output::{FakeOutput, OutputProbe};
pub use scripted_speech::{pcm_bytes, ScriptedSpeech};

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Mutex;
use std::time::Duration;
use xunting_ap::playback::PlaybackSettings;
use xunting_ap::schedule::Clock;
use xunting_common::{Lesson, LessonCategory, Sentence};

/// Lesson with `n` short sentences, ids s1..sn
pub fn test_lesson(n: usize) -> Lesson {
    let sentences = (1..=n)
        .map(|i| Sentence::new(format!("s{}", i), format!("原文{}", i), format!("译文{}", i)))
        .collect();
    Lesson::new("test", "测试课文", LessonCategory::Custom, sentences)
}

/// Retry and skip delays short enough for real-time tests
pub fn fast_settings() -> PlaybackSettings {
    PlaybackSettings {
        retry_limit: 2,
        retry_delay: Duration::from_millis(10),
        skip_notice: Duration::from_millis(10),
    }
}

/// Local time in June 2024. The 3rd is a Monday, the 9th a Sunday.
pub fn june(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
