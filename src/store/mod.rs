// Store operations over the .z-agent/ tree, one module per entity kind
// Functions take &Storage and return typed views; mutating entry points
// hold the storage write lock for their whole read-modify-write cycle

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

pub mod answer;
pub mod lesson;
pub mod memory;
pub mod plan;
pub mod task;

pub use answer::{delete_answer, get_answer, save_answer, AnswerDetail, AnswerLinks, SavedAnswer};
pub use lesson::{
    delete_lesson, get_lesson, record_lesson, search_lessons, update_lesson, LessonUpdate,
    LessonView, SearchHit,
};
pub use memory::{
    add_memory, delete_memory, get_all_memories, get_memory, search_memories, update_memory,
    MemoryUpdate, MemoryView, SavedMemory,
};
pub use plan::{
    create_plan, delete_plan_with_tasks, get_plan, list_plans, update_plan, CreatedPlan,
    PlanDeletion, PlanDetail, PlanSummary, PlanUpdate,
};
pub use task::{
    create_task, delete_task, generate_task_summary, get_task_status, load_todo_items,
    save_todo_result, set_result_status, update_todo, CreatedTask, TaskDetail, TodoListing,
};

/// Outcome of an update-style operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpResult {
    pub success: bool,
    pub message: String,
}

/// Outcome of a delete-style operation; paths are reported as strings so
/// they can go straight into a response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub success: bool,
    pub message: String,
    pub deleted_files: Vec<String>,
}

// Shared by the single-file entity kinds; callers hold the write lock
pub(crate) fn delete_entity_file(path: &Path, kind: &str, id: &str) -> Result<DeleteResult> {
    if !path.exists() {
        return Ok(DeleteResult {
            success: false,
            message: format!("{kind} {id} not found."),
            deleted_files: Vec::new(),
        });
    }
    fs::remove_file(path)?;
    Ok(DeleteResult {
        success: true,
        message: format!("{kind} {id} deleted"),
        deleted_files: vec![path.display().to_string()],
    })
}
