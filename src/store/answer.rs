// Answer store: archived Q&A exchanges under .z-agent/answers/. The
// frontmatter keeps a clipped copy of the question; the body keeps the
// full exchange plus a human-readable reference block.

use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::AnswerFrontmatter;
use crate::storage::{next_id, Storage};
use crate::store::{delete_entity_file, DeleteResult};

#[derive(Debug, Clone)]
pub struct SavedAnswer {
    pub answer_id: String,
    pub file_path: PathBuf,
    pub summary: String,
}

/// Frontmatter of an answer plus the raw file content
#[derive(Debug, Clone)]
pub struct AnswerDetail {
    pub answer: AnswerFrontmatter,
    pub content: String,
}

/// Reference ids attached to an answer at save time
#[derive(Debug, Clone, Default)]
pub struct AnswerLinks {
    pub lessons: Vec<String>,
    pub files: Vec<String>,
    pub plans: Vec<String>,
    pub tasks: Vec<String>,
}

pub fn save_answer(
    storage: &Storage,
    question: &str,
    answer: &str,
    summary: &str,
    links: AnswerLinks,
) -> Result<SavedAnswer> {
    let _guard = storage.write_lock.lock();
    let answer_id = next_id(&storage.answers_dir(), "answer")?;
    let mut frontmatter = AnswerFrontmatter::new(&answer_id, question, summary);
    frontmatter.related_lessons = links.lessons;
    frontmatter.related_files = links.files;
    frontmatter.related_plans = links.plans;
    frontmatter.related_tasks = links.tasks;

    let body = format!(
        "# Question\n{question}\n\n\
         # Answer\n{answer}\n\n\
         # References\n{}\n{}\n{}\n{}",
        reference_line("Lessons", &frontmatter.related_lessons),
        reference_line("Files", &frontmatter.related_files),
        reference_line("Plans", &frontmatter.related_plans),
        reference_line("Tasks", &frontmatter.related_tasks),
    );
    let file_path = storage.answer_path(&answer_id);
    storage.write_entity(&file_path, &frontmatter, &body)?;
    Ok(SavedAnswer {
        answer_id,
        file_path,
        summary: summary.to_string(),
    })
}

fn reference_line(label: &str, ids: &[String]) -> String {
    if ids.is_empty() {
        format!("- {label}: none")
    } else {
        format!("- {label}: {}", ids.join(", "))
    }
}

pub fn get_answer(storage: &Storage, answer_id: &str) -> Result<Option<AnswerDetail>> {
    let path = storage.answer_path(answer_id);
    let Some((mut answer, _)) = storage.read_entity::<AnswerFrontmatter>(&path)? else {
        return Ok(None);
    };
    answer.answer_id = answer_id.to_string();
    let content = fs::read_to_string(&path)?.replace("\r\n", "\n");
    Ok(Some(AnswerDetail { answer, content }))
}

pub fn delete_answer(storage: &Storage, answer_id: &str) -> Result<DeleteResult> {
    let _guard = storage.write_lock.lock();
    delete_entity_file(&storage.answer_path(answer_id), "Answer", answer_id)
}

// ============================================
// TESTS
// ============================================
