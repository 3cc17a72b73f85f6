// Lesson model
// Lessons capture a problem/solution pair for later keyword search

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::LessonCategory;

/// Frontmatter of a lesson file (`.z-agent/lessons/lesson-XXX.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonFrontmatter {
    pub lesson_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub related_tasks: Vec<String>,
    pub category: LessonCategory,
    pub tags: Vec<String>,
    pub use_count: u32,
    pub last_used: Option<DateTime<Utc>>,
}

impl Default for LessonFrontmatter {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            lesson_id: String::new(),
            created_at: now,
            updated_at: now,
            related_tasks: Vec::new(),
            category: LessonCategory::default(),
            tags: Vec::new(),
            use_count: 0,
            last_used: None,
        }
    }
}

impl LessonFrontmatter {
    pub fn new(
        lesson_id: &str,
        category: LessonCategory,
        tags: Vec<String>,
        related_tasks: Vec<String>,
    ) -> Self {
        Self {
            lesson_id: lesson_id.to_string(),
            category,
            tags,
            related_tasks,
            ..Default::default()
        }
    }
}
