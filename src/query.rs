// Read-side aggregation over the whole .z-agent/ tree
// Listings, status breakdowns, the unified query, and the bulk cleanup of
// finished tasks

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    AnswerFrontmatter, Difficulty, LessonCategory, LessonFrontmatter, PlanFrontmatter, PlanStatus,
    TaskFrontmatter, TaskStatus, TodoStatus,
};
use crate::storage::{entity_files, h1_section, Storage};
use crate::store::lesson::{clip, SUMMARY_CLIP};
use crate::store::task::delete_task_files;
use crate::store::{get_task_status, list_plans, PlanSummary};

// ============================================
// LISTING ROWS
// ============================================

/// One row of the task listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task_id: String,
    pub task_desc: String,
    pub status: TaskStatus,
    pub difficulty: Difficulty,
    pub todo_progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_todo: Option<String>,
}

/// Todo counts for one task; completed counts finished todos only, every
/// other state is pending
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusDetail {
    pub task_id: String,
    pub task_desc: String,
    pub status: TaskStatus,
    pub difficulty: Difficulty,
    pub todo_stats: TodoStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_plan: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusDetail {
    pub plan_id: String,
    pub title: String,
    pub status: PlanStatus,
    pub difficulty: Difficulty,
    pub linked_tasks: Vec<String>,
    pub incomplete_tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSummary {
    pub answer_id: String,
    pub question: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub related_lessons: Vec<String>,
    pub related_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub lesson_id: String,
    pub category: LessonCategory,
    pub tags: Vec<String>,
    pub summary: String,
    pub use_count: u32,
}

// ============================================
// LISTINGS
// ============================================

/// Lists tasks newest first, each with its checklist progress and the todo
/// currently being worked on
pub fn list_tasks(storage: &Storage, status: Option<TaskStatus>) -> Result<Vec<TaskSummary>> {
    let mut tasks = Vec::new();
    for (task_id, _) in entity_files(&storage.tasks_dir(), "task")? {
        let detail = get_task_status(storage, &task_id)?;
        let Some(task) = detail.task else { continue };
        if let Some(filter) = status {
            if task.status != filter {
                continue;
            }
        }
        let total = detail.todos.len();
        let completed = detail
            .todos
            .iter()
            .filter(|t| t.status == TodoStatus::Complete)
            .count();
        let progress = if total > 0 {
            (completed as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        let current_todo = detail
            .todos
            .iter()
            .find(|t| t.status == TodoStatus::InProgress)
            .map(|t| t.description.clone());
        tasks.push(TaskSummary {
            task_id: task.task_id,
            task_desc: task.task_desc,
            status: task.status,
            difficulty: task.difficulty,
            todo_progress: format!("{}/{} ({}%)", completed, total, progress),
            current_todo,
        });
    }
    tasks.sort_by(|a, b| b.task_id.cmp(&a.task_id));
    Ok(tasks)
}

/// Lists answers newest first; the keyword matches the question or summary
pub fn list_answers(storage: &Storage, keyword: Option<&str>) -> Result<Vec<AnswerSummary>> {
    let mut answers = Vec::new();
    for (answer_id, path) in entity_files(&storage.answers_dir(), "answer")? {
        let Some((fm, _)) = storage.read_entity::<AnswerFrontmatter>(&path)? else {
            continue;
        };
        if let Some(keyword) = keyword {
            let keyword = keyword.to_lowercase();
            if !fm.question.to_lowercase().contains(&keyword)
                && !fm.summary.to_lowercase().contains(&keyword)
            {
                continue;
            }
        }
        answers.push(AnswerSummary {
            answer_id,
            question: fm.question,
            summary: fm.summary,
            created_at: fm.created_at,
            related_lessons: fm.related_lessons,
            related_files: fm.related_files,
        });
    }
    answers.sort_by(|a, b| b.answer_id.cmp(&a.answer_id));
    Ok(answers)
}

/// Lists lessons newest first; the summary is the head of the problem
/// statement
pub fn list_lessons(
    storage: &Storage,
    category: Option<LessonCategory>,
) -> Result<Vec<LessonSummary>> {
    let mut lessons = Vec::new();
    for (lesson_id, path) in entity_files(&storage.lessons_dir(), "lesson")? {
        let Some((fm, body)) = storage.read_entity::<LessonFrontmatter>(&path)? else {
            continue;
        };
        if let Some(filter) = category {
            if fm.category != filter {
                continue;
            }
        }
        let summary = h1_section(&body, "Problem")
            .map(|p| clip(&p, SUMMARY_CLIP))
            .unwrap_or_default();
        lessons.push(LessonSummary {
            lesson_id,
            category: fm.category,
            tags: fm.tags,
            summary,
            use_count: fm.use_count,
        });
    }
    lessons.sort_by(|a, b| b.lesson_id.cmp(&a.lesson_id));
    Ok(lessons)
}

// ============================================
// STATUS BREAKDOWNS
// ============================================

/// Tasks in one status (or all of them), oldest first, with raw todo counts
/// and the owning plan if one recorded itself on the task
pub fn get_tasks_by_status(
    storage: &Storage,
    status: Option<TaskStatus>,
) -> Result<Vec<TaskStatusDetail>> {
    let mut tasks = Vec::new();
    for (task_id, path) in entity_files(&storage.tasks_dir(), "task")? {
        let Some((fm, body)) = storage.read_entity::<TaskFrontmatter>(&path)? else {
            continue;
        };
        if let Some(filter) = status {
            if fm.status != filter {
                continue;
            }
        }
        let todos = crate::store::task::parse_todo_lines(&body);
        let total = todos.len();
        let completed = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Complete)
            .count();
        tasks.push(TaskStatusDetail {
            task_id,
            task_desc: fm.task_desc,
            status: fm.status,
            difficulty: fm.difficulty,
            todo_stats: TodoStats {
                total,
                completed,
                pending: total - completed,
            },
            linked_plan: fm.linked_plan,
        });
    }
    Ok(tasks)
}

/// Plans in one status (or all of them), oldest first; a linked task counts
/// as incomplete while its file exists and its status is not completed
pub fn get_plans_by_status(
    storage: &Storage,
    status: Option<PlanStatus>,
) -> Result<Vec<PlanStatusDetail>> {
    let mut plans = Vec::new();
    for (plan_id, path) in entity_files(&storage.plans_dir(), "PLAN")? {
        let Some((fm, _)) = storage.read_entity::<PlanFrontmatter>(&path)? else {
            continue;
        };
        if let Some(filter) = status {
            if fm.status != filter {
                continue;
            }
        }
        let mut incomplete_tasks = Vec::new();
        for task_id in &fm.linked_tasks {
            let Some((task, _)) =
                storage.read_entity::<TaskFrontmatter>(&storage.task_path(task_id))?
            else {
                continue;
            };
            if task.status != TaskStatus::Completed {
                incomplete_tasks.push(task_id.clone());
            }
        }
        plans.push(PlanStatusDetail {
            plan_id,
            title: fm.title,
            status: fm.status,
            difficulty: fm.difficulty,
            linked_tasks: fm.linked_tasks,
            incomplete_tasks,
        });
    }
    Ok(plans)
}

// ============================================
// UNIFIED QUERY
// ============================================

/// Section selector for [`query_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[default]
    All,
    Tasks,
    Plans,
    Lessons,
    Answers,
}

/// Filters for the unified query. The status string is matched against the
/// status label of whichever kinds are being queried, so an unknown value
/// simply matches nothing.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub kind: QueryKind,
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub category: Option<LessonCategory>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub task_count: usize,
    pub plan_count: usize,
    pub lesson_count: usize,
    pub answer_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_by_status: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plans_by_status: Option<BTreeMap<String, usize>>,
}

/// Result of [`query_all`]; absent sections were not asked for
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReport {
    pub summary: QuerySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plans: Option<Vec<PlanSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons: Option<Vec<LessonSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerSummary>>,
}

/// One query across tasks, plans, lessons, and answers. The per-status
/// histograms are computed over everything, ignoring the filters, and only
/// when all kinds are queried at once.
pub fn query_all(storage: &Storage, filter: &QueryFilter) -> Result<QueryReport> {
    let mut report = QueryReport::default();
    let keyword = filter.keyword.as_ref().map(|k| k.to_lowercase());

    if matches!(filter.kind, QueryKind::All | QueryKind::Tasks) {
        let mut tasks = list_tasks(storage, None)?;
        if let Some(status) = &filter.status {
            tasks.retain(|t| t.status.label() == status);
        }
        if let Some(kw) = &keyword {
            tasks.retain(|t| {
                t.task_id.to_lowercase().contains(kw) || t.task_desc.to_lowercase().contains(kw)
            });
        }
        report.summary.task_count = tasks.len();
        if filter.kind == QueryKind::All {
            let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
            for task in list_tasks(storage, None)? {
                *by_status.entry(task.status.label().to_string()).or_insert(0) += 1;
            }
            report.summary.tasks_by_status = Some(by_status);
        }
        report.tasks = Some(tasks);
    }

    if matches!(filter.kind, QueryKind::All | QueryKind::Plans) {
        let mut plans = list_plans(storage)?;
        if let Some(status) = &filter.status {
            plans.retain(|p| p.status.label() == status);
        }
        if let Some(kw) = &keyword {
            plans.retain(|p| {
                p.plan_id.to_lowercase().contains(kw) || p.title.to_lowercase().contains(kw)
            });
        }
        report.summary.plan_count = plans.len();
        if filter.kind == QueryKind::All {
            let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
            for plan in list_plans(storage)? {
                *by_status.entry(plan.status.label().to_string()).or_insert(0) += 1;
            }
            report.summary.plans_by_status = Some(by_status);
        }
        report.plans = Some(plans);
    }

    if matches!(filter.kind, QueryKind::All | QueryKind::Lessons) {
        let mut lessons = list_lessons(storage, filter.category)?;
        if let Some(kw) = &keyword {
            lessons.retain(|l| {
                l.lesson_id.to_lowercase().contains(kw)
                    || l.summary.to_lowercase().contains(kw)
                    || l.tags.iter().any(|t| t.to_lowercase().contains(kw))
            });
        }
        report.summary.lesson_count = lessons.len();
        report.lessons = Some(lessons);
    }

    if matches!(filter.kind, QueryKind::All | QueryKind::Answers) {
        let answers = list_answers(storage, filter.keyword.as_deref())?;
        report.summary.answer_count = answers.len();
        report.answers = Some(answers);
    }

    Ok(report)
}

// ============================================
// BULK CLEANUP
// ============================================

/// Outcome of the completed-task cleanup
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted_tasks: Vec<String>,
    pub deleted_files: Vec<String>,
}

/// Deletes every task whose frontmatter status is completed, along with its
/// todo detail directory. Only an explicit status edit marks a task
/// completed, so this never races the checklist.
pub fn delete_completed_tasks(storage: &Storage) -> Result<CleanupReport> {
    let _guard = storage.write_lock.lock();
    let completed = get_tasks_by_status(storage, Some(TaskStatus::Completed))?;
    let mut report = CleanupReport::default();
    for task in completed {
        let result = delete_task_files(storage, &task.task_id)?;
        if result.success {
            report.deleted_tasks.push(task.task_id);
            report.deleted_files.extend(result.deleted_files);
        }
    }
    Ok(report)
}
