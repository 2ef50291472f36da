//! Lesson sources
//!
//! Lessons come either from the built-in catalog or from remote generation by
//! free-text name (see [`crate::gemini::GeminiClient`]).

use crate::error::{Error, Result};
use async_trait::async_trait;
use xunting_common::{catalog, Lesson, LessonCategory};

/// Resolves a lesson from a lookup key
#[async_trait]
pub trait LessonSource: Send + Sync {
    /// Fetch the lesson identified by `key`. What the key means is up to the source.
    async fn fetch_lesson(&self, key: &str) -> Result<Lesson>;
}

/// The static lesson catalog. Keys are lesson ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogLessonSource;

impl CatalogLessonSource {
    pub fn new() -> Self {
        Self
    }

    /// Lessons in one category, in library order
    pub fn browse(&self, category: LessonCategory) -> Vec<Lesson> {
        catalog::lessons_in_category(category)
    }

    pub fn all(&self) -> Vec<Lesson> {
        catalog::builtin_lessons()
    }
}

#[async_trait]
impl LessonSource for CatalogLessonSource {
    async fn fetch_lesson(&self, key: &str) -> Result<Lesson> {
        catalog::find_lesson(key.trim())
            .ok_or_else(|| Error::InvalidInput(format!("no lesson with id '{}'", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_lookup_by_id() {
        let source = CatalogLessonSource::new();
        let lesson = source.fetch_lesson(" l2 ").await.unwrap();
        assert_eq!(lesson.title, "爱莲说");
        assert!(matches!(
            source.fetch_lesson("zz").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_browse_by_category() {
        let source = CatalogLessonSource::new();
        assert_eq!(source.browse(LessonCategory::English).len(), 1);
        assert_eq!(source.all().len(), 3);
    }
}
