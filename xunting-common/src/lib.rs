//! # Xunting Common Library
//!
//! Shared code for the Xunting reader:
//! - Lesson, sentence and schedule models
//! - Schedule editing operations
//! - Built-in lesson catalog
//! - Event types (XuntingEvent enum) and the EventBus
//! - Configuration file resolution
//! - Persisted application state
//! - Time utilities

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod schedule;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use models::{Lesson, LessonCategory, Sentence};
pub use schedule::{ClockTime, Schedule};
