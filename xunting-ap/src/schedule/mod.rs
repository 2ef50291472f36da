//! Schedule-driven activation

pub mod driver;
pub mod matcher;

pub use driver::{ActivationRequest, Clock, LocalClock, ScheduleMatcher};
pub use matcher::{find_matching_schedule, schedule_matches};
