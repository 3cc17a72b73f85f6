// Cross-links between answers, plans, and tasks
// Answer links are written on both sides; a plan-to-task link lives on the
// plan alone, the task file is never touched

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{AnswerFrontmatter, PlanFrontmatter, PlanStatus, TaskFrontmatter};
use crate::storage::Storage;

/// Entity kinds that can be asked for their cross-links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Answer,
    Plan,
    Task,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Plan => "plan",
            Self::Task => "task",
        }
    }
}

/// Everything linked to one entity, grouped by kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelatedItems {
    pub answers: Vec<String>,
    pub plans: Vec<String>,
    pub tasks: Vec<String>,
    pub lessons: Vec<String>,
}

/// Records a task on its plan and moves a freshly drafted plan into
/// in_progress. The task side carries no plan field to update, so the task
/// file is not checked or written.
pub fn link_plan_to_task(storage: &Storage, plan_id: &str, task_id: &str) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    let path = storage.plan_path(plan_id);
    let Some((mut frontmatter, body)) = storage.read_entity::<PlanFrontmatter>(&path)? else {
        return Ok(false);
    };
    if !frontmatter.linked_tasks.iter().any(|t| t == task_id) {
        frontmatter.linked_tasks.push(task_id.to_string());
    }
    if matches!(frontmatter.status, PlanStatus::Draft | PlanStatus::Ready) {
        frontmatter.status = PlanStatus::InProgress;
    }
    storage.write_entity(&path, &frontmatter, &body)?;
    Ok(true)
}

/// Links an answer and a plan in both directions; `false` when either file
/// is missing
pub fn link_answer_to_plan(storage: &Storage, answer_id: &str, plan_id: &str) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    let answer_path = storage.answer_path(answer_id);
    let plan_path = storage.plan_path(plan_id);

    let Some((mut answer, answer_body)) =
        storage.read_entity::<AnswerFrontmatter>(&answer_path)?
    else {
        return Ok(false);
    };
    let Some((mut plan, plan_body)) = storage.read_entity::<PlanFrontmatter>(&plan_path)? else {
        return Ok(false);
    };

    if !answer.related_plans.iter().any(|p| p == plan_id) {
        answer.related_plans.push(plan_id.to_string());
        storage.write_entity(&answer_path, &answer, &answer_body)?;
    }
    let answers = plan.related_answers.get_or_insert_with(Vec::new);
    if !answers.iter().any(|a| a == answer_id) {
        answers.push(answer_id.to_string());
        storage.write_entity(&plan_path, &plan, &plan_body)?;
    }
    Ok(true)
}

/// Links an answer and a task in both directions; `false` when either file
/// is missing
pub fn link_answer_to_task(storage: &Storage, answer_id: &str, task_id: &str) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    let answer_path = storage.answer_path(answer_id);
    let task_path = storage.task_path(task_id);

    let Some((mut answer, answer_body)) =
        storage.read_entity::<AnswerFrontmatter>(&answer_path)?
    else {
        return Ok(false);
    };
    let Some((mut task, task_body)) = storage.read_entity::<TaskFrontmatter>(&task_path)? else {
        return Ok(false);
    };

    if !answer.related_tasks.iter().any(|t| t == task_id) {
        answer.related_tasks.push(task_id.to_string());
        storage.write_entity(&answer_path, &answer, &answer_body)?;
    }
    let answers = task.related_answers.get_or_insert_with(Vec::new);
    if !answers.iter().any(|a| a == answer_id) {
        answers.push(answer_id.to_string());
        storage.write_entity(&task_path, &task, &task_body)?;
    }
    Ok(true)
}

/// Collects everything linked to one entity from its own frontmatter;
/// `None` when the entity does not exist
pub fn get_related_items(
    storage: &Storage,
    kind: EntityKind,
    id: &str,
) -> Result<Option<RelatedItems>> {
    let related = match kind {
        EntityKind::Answer => {
            let Some((fm, _)) = storage.read_entity::<AnswerFrontmatter>(&storage.answer_path(id))?
            else {
                return Ok(None);
            };
            RelatedItems {
                plans: fm.related_plans,
                tasks: fm.related_tasks,
                lessons: fm.related_lessons,
                ..Default::default()
            }
        }
        EntityKind::Plan => {
            let Some((fm, _)) = storage.read_entity::<PlanFrontmatter>(&storage.plan_path(id))?
            else {
                return Ok(None);
            };
            RelatedItems {
                tasks: fm.linked_tasks,
                answers: fm.related_answers.unwrap_or_default(),
                ..Default::default()
            }
        }
        EntityKind::Task => {
            let Some((fm, _)) = storage.read_entity::<TaskFrontmatter>(&storage.task_path(id))?
            else {
                return Ok(None);
            };
            RelatedItems {
                lessons: fm.related_lessons,
                answers: fm.related_answers.unwrap_or_default(),
                ..Default::default()
            }
        }
    };
    Ok(Some(related))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_storage, StorageState};
    use crate::store::{
        create_plan, create_task, get_plan, save_answer, update_plan, AnswerLinks, PlanUpdate,
    };
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, StorageState) {
        let dir = TempDir::new().unwrap();
        let storage = init_storage(dir.path(), false);
        storage.ensure_directories().unwrap();
        (dir, storage)
    }

    #[test]
    fn plan_link_records_task_and_promotes_status() {
        let (_dir, storage) = test_storage();
        create_plan(&storage, "Cache", "Add a cache layer", vec![]).unwrap();

        assert!(link_plan_to_task(&storage, "PLAN-001", "task-001").unwrap());
        let (plan, _) = get_plan(&storage, "PLAN-001").unwrap().unwrap();
        assert_eq!(plan.linked_tasks, vec!["task-001"]);
        assert_eq!(plan.status, PlanStatus::InProgress);

        // relinking keeps the list deduplicated
        assert!(link_plan_to_task(&storage, "PLAN-001", "task-001").unwrap());
        let (plan, _) = get_plan(&storage, "PLAN-001").unwrap().unwrap();
        assert_eq!(plan.linked_tasks, vec!["task-001"]);
    }

    #[test]
    fn plan_link_fails_without_a_plan_file() {
        let (_dir, storage) = test_storage();
        assert!(!link_plan_to_task(&storage, "PLAN-404", "task-001").unwrap());
    }

    #[test]
    fn linking_leaves_a_completed_plan_completed() {
        let (_dir, storage) = test_storage();
        create_plan(&storage, "Cache", "Add a cache layer", vec![]).unwrap();
        update_plan(
            &storage,
            "PLAN-001",
            PlanUpdate {
                status: Some(PlanStatus::Completed),
                todos: None,
                content: None,
            },
        )
        .unwrap();

        assert!(link_plan_to_task(&storage, "PLAN-001", "task-002").unwrap());
        let (plan, _) = get_plan(&storage, "PLAN-001").unwrap().unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.linked_tasks, vec!["task-002"]);
    }

    #[test]
    fn answer_plan_link_writes_both_sides() {
        let (_dir, storage) = test_storage();
        save_answer(&storage, "Why YAML?", "Because.", "short", AnswerLinks::default()).unwrap();
        create_plan(&storage, "Cache", "Add a cache layer", vec![]).unwrap();

        assert!(link_answer_to_plan(&storage, "answer-001", "PLAN-001").unwrap());
        let related = get_related_items(&storage, EntityKind::Answer, "answer-001")
            .unwrap()
            .unwrap();
        assert_eq!(related.plans, vec!["PLAN-001"]);
        let related = get_related_items(&storage, EntityKind::Plan, "PLAN-001")
            .unwrap()
            .unwrap();
        assert_eq!(related.answers, vec!["answer-001"]);

        // second link is a no-op on both sides
        assert!(link_answer_to_plan(&storage, "answer-001", "PLAN-001").unwrap());
        let related = get_related_items(&storage, EntityKind::Plan, "PLAN-001")
            .unwrap()
            .unwrap();
        assert_eq!(related.answers, vec!["answer-001"]);
    }

    #[test]
    fn answer_links_require_both_files() {
        let (_dir, storage) = test_storage();
        save_answer(&storage, "Q", "A", "s", AnswerLinks::default()).unwrap();
        assert!(!link_answer_to_plan(&storage, "answer-001", "PLAN-404").unwrap());
        assert!(!link_answer_to_task(&storage, "answer-001", "task-404").unwrap());
        assert!(!link_answer_to_plan(&storage, "answer-404", "PLAN-001").unwrap());
    }

    #[test]
    fn answer_task_link_writes_both_sides() {
        let (_dir, storage) = test_storage();
        save_answer(&storage, "Q", "A", "s", AnswerLinks::default()).unwrap();
        let task = create_task(&storage, "wire the cache", None).unwrap();

        assert!(link_answer_to_task(&storage, "answer-001", &task.task_id).unwrap());
        let related = get_related_items(&storage, EntityKind::Task, &task.task_id)
            .unwrap()
            .unwrap();
        assert_eq!(related.answers, vec!["answer-001"]);
        let related = get_related_items(&storage, EntityKind::Answer, "answer-001")
            .unwrap()
            .unwrap();
        assert_eq!(related.tasks, vec![task.task_id]);
    }

    #[test]
    fn related_items_for_missing_entities_are_none() {
        let (_dir, storage) = test_storage();
        assert!(get_related_items(&storage, EntityKind::Answer, "answer-404")
            .unwrap()
            .is_none());
        assert!(get_related_items(&storage, EntityKind::Plan, "PLAN-404")
            .unwrap()
            .is_none());
        assert!(get_related_items(&storage, EntityKind::Task, "task-404")
            .unwrap()
            .is_none());
    }
}
