//! Interactive command parsing
//!
//! Each line typed at the prompt is one user gesture.

use crate::error::{Error, Result};
use xunting_common::ClockTime;

pub const HELP: &str = "\
commands:
  play                 unlock audio and play the current lesson
  pause | resume       pause or continue
  next | prev          move one sentence forward or back
  goto N               jump to sentence N (1-based)
  loop on|off          repeat the current sentence
  lesson <id>          open a built-in lesson (l1, l2, e1)
  lessons              list built-in lessons
  fetch <name>         generate a lesson by name
  arm | disarm         auto mode: let schedules open the player
  schedules            list schedules
  toggle <id>          enable or disable a schedule
  day <id> <0-6>       toggle a weekday (0 = Sunday)
  time <id> HH:MM HH:MM  set start and end time
  add <name> HH:MM HH:MM [days...]  add a schedule
  remove <id>          delete a schedule
  status               show player state
  back                 leave the player
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Play,
    Pause,
    Resume,
    Next,
    Previous,
    /// Zero-based sentence index
    Goto(usize),
    Loop(bool),
    Lesson(String),
    Lessons,
    Fetch(String),
    Arm,
    Disarm,
    Schedules,
    Toggle(String),
    Day(String, u8),
    Time(String, ClockTime, ClockTime),
    Add {
        name: String,
        start: ClockTime,
        end: ClockTime,
        days: Vec<u8>,
    },
    Remove(String),
    Status,
    Back,
    Help,
    Quit,
}

impl CliCommand {
    /// Parse one input line. Blank lines yield None.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("play", []) => CliCommand::Play,
            ("pause", []) => CliCommand::Pause,
            ("resume", []) => CliCommand::Resume,
            ("next", []) => CliCommand::Next,
            ("prev", []) => CliCommand::Previous,
            ("goto", [n]) => {
                let n: usize = n
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("not a sentence number: {}", n)))?;
                let index = n
                    .checked_sub(1)
                    .ok_or_else(|| Error::InvalidInput("sentences are numbered from 1".to_string()))?;
                CliCommand::Goto(index)
            }
            ("loop", ["on"]) => CliCommand::Loop(true),
            ("loop", ["off"]) => CliCommand::Loop(false),
            ("lesson", [id]) => CliCommand::Lesson(id.to_string()),
            ("lessons", []) => CliCommand::Lessons,
            ("fetch", name) if !name.is_empty() => CliCommand::Fetch(name.join(" ")),
            ("arm", []) => CliCommand::Arm,
            ("disarm", []) => CliCommand::Disarm,
            ("schedules", []) => CliCommand::Schedules,
            ("toggle", [id]) => CliCommand::Toggle(id.to_string()),
            ("day", [id, day]) => {
                let day = day
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("not a weekday index: {}", day)))?;
                CliCommand::Day(id.to_string(), day)
            }
            ("time", [id, start, end]) => {
                CliCommand::Time(id.to_string(), start.parse()?, end.parse()?)
            }
            ("add", [name, start, end, days @ ..]) => CliCommand::Add {
                name: name.to_string(),
                start: start.parse()?,
                end: end.parse()?,
                days: days
                    .iter()
                    .map(|d| {
                        d.parse::<u8>()
                            .map_err(|_| Error::InvalidInput(format!("not a weekday index: {}", d)))
                    })
                    .collect::<Result<Vec<u8>>>()?,
            },
            ("remove", [id]) => CliCommand::Remove(id.to_string()),
            ("status", []) => CliCommand::Status,
            ("back", []) => CliCommand::Back,
            ("help", []) | ("?", []) => CliCommand::Help,
            ("quit", []) | ("exit", []) => CliCommand::Quit,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "unrecognized command '{}' (type 'help')",
                    line.trim()
                )))
            }
        };
        Ok(Some(command))
    }
}
