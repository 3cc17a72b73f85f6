// Plan store: planning documents under .z-agent/plans/, created from a
// title/description pair and filled in section by section afterwards

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::difficulty::analyze_difficulty;
use crate::error::Result;
use crate::models::{Difficulty, PlanFrontmatter, PlanStatus, PlanTodo};
use crate::storage::{entity_files, h2_section, next_id, replace_h2_section, Storage};
use crate::store::task::delete_task_files;
use crate::store::delete_entity_file;

#[derive(Debug, Clone)]
pub struct CreatedPlan {
    pub plan_id: String,
    pub file_path: PathBuf,
    pub related_answers: Vec<String>,
}

/// Parsed view of a plan: frontmatter plus the todos of its TODO List
/// section
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetail {
    pub plan_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: PlanStatus,
    pub difficulty: Difficulty,
    pub linked_tasks: Vec<String>,
    pub todos: Vec<PlanTodo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_answers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_id: String,
    pub title: String,
    pub status: PlanStatus,
    pub difficulty: Difficulty,
}

/// Patch for an existing plan; absent fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct PlanUpdate {
    pub status: Option<PlanStatus>,
    pub todos: Option<Vec<PlanTodo>>,
    pub content: Option<String>,
}

/// Outcome of deleting a plan together with (or while keeping) its tasks
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDeletion {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_plan: Option<String>,
    pub deleted_tasks: Vec<String>,
    pub deleted_files: Vec<String>,
    pub skipped_tasks: Vec<String>,
}

/// Creates a plan skeleton; difficulty comes from the description. The
/// body sections stay as placeholders until the plan is worked out.
pub fn create_plan(
    storage: &Storage,
    title: &str,
    description: &str,
    related_answers: Vec<String>,
) -> Result<CreatedPlan> {
    let _guard = storage.write_lock.lock();
    let plan_id = next_id(&storage.plans_dir(), "PLAN")?;
    let analysis = analyze_difficulty(description);
    let frontmatter = PlanFrontmatter::new(
        &plan_id,
        title,
        description,
        analysis.difficulty,
        related_answers.clone(),
    );

    let mut body = format!(
        "# {title}\n\n\
         ## Overview\n{description}\n\n\
         ## Goals\n(to be filled in during planning)\n\n\
         ## TODO List\n(to be filled in during planning)\n\n\
         ## Strategy\n(to be filled in during planning)\n\n\
         ## Open Issues\n(to be filled in during planning)\n\n\
         ## Notes\n(to be filled in during planning)"
    );
    if !related_answers.is_empty() {
        body.push_str("\n\n## Related Answers\n");
        let lines: Vec<String> = related_answers.iter().map(|a| format!("- {a}")).collect();
        body.push_str(&lines.join("\n"));
    }

    let file_path = storage.plan_path(&plan_id);
    storage.write_entity(&file_path, &frontmatter, &body)?;
    Ok(CreatedPlan {
        plan_id,
        file_path,
        related_answers,
    })
}

/// Applies a patch to a plan file; returns false when the plan is missing.
/// Free-form `content` replaces everything below the title line.
pub fn update_plan(storage: &Storage, plan_id: &str, updates: PlanUpdate) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    let path = storage.plan_path(plan_id);
    let Some((mut frontmatter, mut body)) = storage.read_entity::<PlanFrontmatter>(&path)? else {
        return Ok(false);
    };

    if let Some(status) = updates.status {
        frontmatter.status = status;
    }
    if let Some(todos) = &updates.todos {
        if !todos.is_empty() {
            let rendered: Vec<String> = todos
                .iter()
                .enumerate()
                .map(|(i, todo)| todo.render(i + 1))
                .collect();
            if let Some(replaced) = replace_h2_section(&body, "TODO List", &rendered.join("\n")) {
                body = replaced;
            }
        }
    }
    if let Some(content) = &updates.content {
        body = match body.find("\n## ") {
            Some(pos) => format!("{}\n{}", &body[..pos], content),
            None => format!("{body}\n{content}"),
        };
    }

    storage.write_entity(&path, &frontmatter, &body)?;
    Ok(true)
}

/// Returns the parsed plan plus the raw file content, or `None` when the
/// plan does not exist
pub fn get_plan(storage: &Storage, plan_id: &str) -> Result<Option<(PlanDetail, String)>> {
    let path = storage.plan_path(plan_id);
    let Some((frontmatter, body)) = storage.read_entity::<PlanFrontmatter>(&path)? else {
        return Ok(None);
    };
    let content = fs::read_to_string(&path)?.replace("\r\n", "\n");
    let todos = match h2_section(&body, "TODO List") {
        Some(section) => section.lines().filter_map(PlanTodo::parse).collect(),
        None => Vec::new(),
    };
    Ok(Some((
        PlanDetail {
            plan_id: plan_id.to_string(),
            title: frontmatter.title,
            description: frontmatter.description,
            created_at: frontmatter.created_at,
            status: frontmatter.status,
            difficulty: frontmatter.difficulty,
            linked_tasks: frontmatter.linked_tasks,
            todos,
            related_answers: frontmatter.related_answers,
        },
        content,
    )))
}

pub fn list_plans(storage: &Storage) -> Result<Vec<PlanSummary>> {
    let mut plans = Vec::new();
    for (plan_id, path) in entity_files(&storage.plans_dir(), "PLAN")? {
        let Some((frontmatter, _)) = storage.read_entity::<PlanFrontmatter>(&path)? else {
            continue;
        };
        plans.push(PlanSummary {
            plan_id,
            title: frontmatter.title,
            status: frontmatter.status,
            difficulty: frontmatter.difficulty,
        });
    }
    plans.sort_by(|a, b| b.plan_id.cmp(&a.plan_id));
    Ok(plans)
}

/// Deletes a plan; linked tasks are deleted too when requested, otherwise
/// they are reported as kept
pub fn delete_plan_with_tasks(
    storage: &Storage,
    plan_id: &str,
    delete_linked_tasks: bool,
) -> Result<PlanDeletion> {
    let _guard = storage.write_lock.lock();
    let Some((plan, _)) = get_plan(storage, plan_id)? else {
        return Ok(PlanDeletion {
            success: false,
            message: format!("Plan {plan_id} not found."),
            deleted_plan: None,
            deleted_tasks: Vec::new(),
            deleted_files: Vec::new(),
            skipped_tasks: Vec::new(),
        });
    };

    let mut deleted_tasks = Vec::new();
    let mut deleted_files = Vec::new();
    let mut skipped_tasks = Vec::new();
    if delete_linked_tasks {
        for task_id in &plan.linked_tasks {
            let result = delete_task_files(storage, task_id)?;
            if result.success {
                deleted_tasks.push(task_id.clone());
                deleted_files.extend(result.deleted_files);
            } else {
                skipped_tasks.push(task_id.clone());
            }
        }
    } else {
        skipped_tasks.extend(plan.linked_tasks.iter().cloned());
    }

    let plan_result = delete_entity_file(&storage.plan_path(plan_id), "Plan", plan_id)?;
    if plan_result.success {
        deleted_files.extend(plan_result.deleted_files);
    }
    Ok(PlanDeletion {
        success: plan_result.success,
        message: if plan_result.success {
            format!(
                "Plan {plan_id} deleted (tasks: {} deleted, {} kept)",
                deleted_tasks.len(),
                skipped_tasks.len()
            )
        } else {
            plan_result.message
        },
        deleted_plan: plan_result.success.then(|| plan_id.to_string()),
        deleted_tasks,
        deleted_files,
        skipped_tasks,
    })
}

// ============================================
// TESTS
// ============================================
