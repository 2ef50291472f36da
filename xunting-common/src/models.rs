//! Lesson and sentence models
//!
//! A lesson is an immutable, ordered list of sentences. Order is playback order.
//! Lessons are replaced wholesale when a new one is chosen, never edited in place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between the original text and its translation when both are
/// read as a single utterance.
pub const UTTERANCE_SEPARATOR: &str = "。";

/// Lesson category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonCategory {
    /// Middle-school classical texts
    Middle,
    /// High-school classical texts
    High,
    /// English passages
    English,
    /// Lessons generated from a free-text request
    Custom,
}

impl LessonCategory {
    /// Parse a category tag, falling back to `Custom` for anything unrecognized
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "middle" => LessonCategory::Middle,
            "high" => LessonCategory::High,
            "english" => LessonCategory::English,
            _ => LessonCategory::Custom,
        }
    }
}

impl fmt::Display for LessonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonCategory::Middle => write!(f, "middle"),
            LessonCategory::High => write!(f, "high"),
            LessonCategory::English => write!(f, "english"),
            LessonCategory::Custom => write!(f, "custom"),
        }
    }
}

/// One sentence of a lesson: original text plus its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: String,
    pub original: String,
    pub translation: String,
}

impl Sentence {
    pub fn new(
        id: impl Into<String>,
        original: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original: original.into(),
            translation: translation.into(),
        }
    }

    /// Text submitted to speech synthesis: original and translation read as one breath unit.
    pub fn utterance(&self) -> String {
        format!("{}{}{}", self.original, UTTERANCE_SEPARATOR, self.translation)
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sentence {{ id: {}, original: {} }}", self.id, self.original)
    }
}

/// A lesson: titled, categorized, ordered sentence list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub category: LessonCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub sentences: Vec<Sentence>,
}

impl Lesson {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: LessonCategory,
        sentences: Vec<Sentence>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category,
            author: None,
            sentences,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentence(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }
}
