// Lesson store: problem/solution notes under .z-agent/lessons/, surfaced
// again through a word-overlap relevance search

use std::fs;

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::models::{LessonCategory, LessonFrontmatter};
use crate::storage::{entity_files, h1_section, next_id, replace_h1_section, Storage};
use crate::store::{delete_entity_file, DeleteResult, OpResult};

/// Lesson summaries show the first part of the problem statement
pub(crate) const SUMMARY_CLIP: usize = 100;

/// Full view of one lesson, body sections included
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub lesson_id: String,
    pub category: LessonCategory,
    pub tags: Vec<String>,
    pub summary: String,
    pub problem: String,
    pub solution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
    pub related_tasks: Vec<String>,
    pub use_count: u32,
}

/// One relevance-ranked search result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub lesson_id: String,
    pub category: LessonCategory,
    pub tags: Vec<String>,
    pub summary: String,
}

/// Patch for an existing lesson; absent fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct LessonUpdate {
    pub category: Option<LessonCategory>,
    pub tags: Option<Vec<String>>,
    pub related_tasks: Option<Vec<String>>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub conditions: Option<String>,
    pub warnings: Option<String>,
}

pub fn record_lesson(
    storage: &Storage,
    category: LessonCategory,
    problem: &str,
    solution: &str,
    tags: Vec<String>,
    related_tasks: Vec<String>,
) -> Result<String> {
    let _guard = storage.write_lock.lock();
    let lesson_id = next_id(&storage.lessons_dir(), "lesson")?;
    let frontmatter = LessonFrontmatter::new(&lesson_id, category, tags, related_tasks);
    let body = format!(
        "# Problem\n{problem}\n\n\
         # Solution\n{solution}\n\n\
         # Conditions\n(to be filled in later)\n\n\
         # Warnings\n(to be filled in later)"
    );
    storage.write_entity(&storage.lesson_path(&lesson_id), &frontmatter, &body)?;
    Ok(lesson_id)
}

pub fn get_lesson(storage: &Storage, lesson_id: &str) -> Result<Option<LessonView>> {
    let Some((frontmatter, body)) =
        storage.read_entity::<LessonFrontmatter>(&storage.lesson_path(lesson_id))?
    else {
        return Ok(None);
    };
    let problem = h1_section(&body, "Problem").unwrap_or_default();
    Ok(Some(LessonView {
        lesson_id: lesson_id.to_string(),
        category: frontmatter.category,
        tags: frontmatter.tags,
        summary: clip(&problem, SUMMARY_CLIP),
        solution: h1_section(&body, "Solution").unwrap_or_default(),
        conditions: h1_section(&body, "Conditions"),
        warnings: h1_section(&body, "Warnings"),
        problem,
        related_tasks: frontmatter.related_tasks,
        use_count: frontmatter.use_count,
    }))
}

pub fn update_lesson(
    storage: &Storage,
    lesson_id: &str,
    updates: LessonUpdate,
) -> Result<OpResult> {
    let _guard = storage.write_lock.lock();
    let path = storage.lesson_path(lesson_id);
    let Some((mut frontmatter, mut body)) = storage.read_entity::<LessonFrontmatter>(&path)? else {
        return Ok(OpResult {
            success: false,
            message: format!("Lesson {lesson_id} not found"),
        });
    };

    frontmatter.updated_at = Utc::now();
    if let Some(category) = updates.category {
        frontmatter.category = category;
    }
    if let Some(tags) = updates.tags {
        frontmatter.tags = tags;
    }
    if let Some(related_tasks) = updates.related_tasks {
        frontmatter.related_tasks = related_tasks;
    }

    // sections that are missing from the body are skipped, not appended
    for (title, update) in [
        ("Problem", updates.problem),
        ("Solution", updates.solution),
        ("Conditions", updates.conditions),
        ("Warnings", updates.warnings),
    ] {
        let Some(text) = update else { continue };
        if let Some(replaced) = replace_h1_section(&body, title, &text) {
            body = replaced;
        }
    }

    storage.write_entity(&path, &frontmatter, &body)?;
    Ok(OpResult {
        success: true,
        message: format!("Lesson {lesson_id} updated"),
    })
}

pub fn delete_lesson(storage: &Storage, lesson_id: &str) -> Result<DeleteResult> {
    let _guard = storage.write_lock.lock();
    delete_entity_file(&storage.lesson_path(lesson_id), "Lesson", lesson_id)
}

/// Scores every lesson against the query words: 3 points for a tag hit,
/// 2 for a category hit, 1 for a hit anywhere in the file. Returns the top
/// `limit` lessons with a positive score.
pub fn search_lessons(storage: &Storage, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut scored: Vec<(u32, SearchHit)> = Vec::new();

    for (lesson_id, path) in entity_files(&storage.lessons_dir(), "lesson")? {
        let raw = fs::read_to_string(&path)?.to_lowercase();
        let Some((frontmatter, body)) = storage.read_entity::<LessonFrontmatter>(&path)? else {
            continue;
        };
        let mut score = 0u32;
        for word in &words {
            if frontmatter
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(word))
            {
                score += 3;
            }
            if frontmatter.category.label().contains(word) {
                score += 2;
            }
            if raw.contains(word) {
                score += 1;
            }
        }
        if score > 0 {
            let problem = h1_section(&body, "Problem").unwrap_or_default();
            scored.push((
                score,
                SearchHit {
                    lesson_id,
                    category: frontmatter.category,
                    tags: frontmatter.tags,
                    summary: clip(&problem, SUMMARY_CLIP),
                },
            ));
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    Ok(scored.into_iter().map(|(_, hit)| hit).collect())
}

pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_storage, StorageState};
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, StorageState) {
        let dir = TempDir::new().unwrap();
        let storage = init_storage(dir.path(), false);
        storage.ensure_directories().unwrap();
        (dir, storage)
    }

    #[test]
    fn records_and_reads_back_a_lesson() {
        let (_dir, storage) = test_storage();
        let id = record_lesson(
            &storage,
            LessonCategory::Debugging,
            "tokio tasks deadlock on a blocking recv",
            "use spawn_blocking for the channel bridge",
            vec!["tokio".to_string(), "deadlock".to_string()],
            vec!["task-001".to_string()],
        )
        .unwrap();
        assert_eq!(id, "lesson-001");

        let view = get_lesson(&storage, &id).unwrap().unwrap();
        assert_eq!(view.category, LessonCategory::Debugging);
        assert_eq!(view.problem, "tokio tasks deadlock on a blocking recv");
        assert_eq!(view.solution, "use spawn_blocking for the channel bridge");
        assert_eq!(view.conditions.as_deref(), Some("(to be filled in later)"));
        assert_eq!(view.related_tasks, vec!["task-001"]);
        assert_eq!(view.use_count, 0);
        assert!(view.summary.starts_with("tokio tasks deadlock"));
    }

    #[test]
    fn missing_lesson_is_none() {
        let (_dir, storage) = test_storage();
        assert!(get_lesson(&storage, "lesson-404").unwrap().is_none());
    }

    #[test]
    fn search_prefers_tag_matches() {
        let (_dir, storage) = test_storage();
        record_lesson(
            &storage,
            LessonCategory::Performance,
            "slow queries on startup",
            "add an index",
            vec!["database".to_string()],
            Vec::new(),
        )
        .unwrap();
        record_lesson(
            &storage,
            LessonCategory::Debugging,
            "database connection drops",
            "retry with backoff",
            vec!["network".to_string()],
            Vec::new(),
        )
        .unwrap();

        let hits = search_lessons(&storage, "database", 5).unwrap();
        assert_eq!(hits.len(), 2);
        // tag hit outranks a body-only hit
        assert_eq!(hits[0].lesson_id, "lesson-001");

        assert_eq!(search_lessons(&storage, "database", 1).unwrap().len(), 1);
        assert!(search_lessons(&storage, "quantum", 5).unwrap().is_empty());
    }

    #[test]
    fn update_patches_sections_and_frontmatter() {
        let (_dir, storage) = test_storage();
        let id = record_lesson(
            &storage,
            LessonCategory::BestPractice,
            "original problem",
            "original solution",
            vec!["old".to_string()],
            Vec::new(),
        )
        .unwrap();

        let result = update_lesson(
            &storage,
            &id,
            LessonUpdate {
                tags: Some(vec!["new".to_string()]),
                solution: Some("pin the dependency".to_string()),
                conditions: Some("only on 1.80+".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Lesson lesson-001 updated");

        let view = get_lesson(&storage, &id).unwrap().unwrap();
        assert_eq!(view.tags, vec!["new"]);
        assert_eq!(view.problem, "original problem");
        assert_eq!(view.solution, "pin the dependency");
        assert_eq!(view.conditions.as_deref(), Some("only on 1.80+"));
    }

    #[test]
    fn update_of_missing_lesson_fails() {
        let (_dir, storage) = test_storage();
        let result = update_lesson(&storage, "lesson-404", LessonUpdate::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "Lesson lesson-404 not found");
    }

    #[test]
    fn delete_removes_the_file() {
        let (_dir, storage) = test_storage();
        let id = record_lesson(
            &storage,
            LessonCategory::Security,
            "p",
            "s",
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let result = delete_lesson(&storage, &id).unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Lesson lesson-001 deleted");
        assert!(!storage.lesson_path(&id).exists());
        assert!(!delete_lesson(&storage, &id).unwrap().success);
    }
}
