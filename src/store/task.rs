// Task store: one markdown file per task under .z-agent/tasks/ plus a
// directory of todo detail files at .z-agent/{taskId}/. The glyph lines in
// the task body are the source of truth for todo status; detail files are
// kept in sync best-effort.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_yaml::Value;
use tracing::debug;

use crate::difficulty::analyze_difficulty;
use crate::error::Result;
use crate::models::{
    Difficulty, ResultStatus, TaskFrontmatter, TaskStatus, TodoFrontmatter, TodoItem, TodoLine,
    TodoResultFrontmatter, TodoSpec, TodoStatus,
};
use crate::parallel::{analyze_parallel_groups, ParallelAnalysis};
use crate::storage::{h1_section, next_id, split_frontmatter, Storage};
use crate::store::lesson::search_lessons;
use crate::store::DeleteResult;

/// Everything a caller needs to report about a freshly created task
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub task_id: String,
    pub file_path: PathBuf,
    pub difficulty: Difficulty,
    pub suggested_model: &'static str,
    pub todo_count: usize,
    pub related_lessons: Vec<String>,
    pub analysis: ParallelAnalysis,
}

/// Snapshot of a task file: frontmatter plus the parsed checklist
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    pub task: Option<TaskFrontmatter>,
    pub todos: Vec<TodoLine>,
}

/// Todo list of a task merged with per-todo detail metadata
#[derive(Debug, Clone)]
pub enum TodoListing {
    /// No task file at all
    Missing,
    /// Task file exists but carries no `# TODO List` section
    NoSection,
    Todos(Vec<TodoItem>),
}

/// Creates the task file and its todo detail directory. When `todos` is
/// absent the description itself becomes a single todo; an explicitly empty
/// list produces a task with an empty checklist.
pub fn create_task(
    storage: &Storage,
    description: &str,
    todos: Option<Vec<TodoSpec>>,
) -> Result<CreatedTask> {
    let analysis = analyze_difficulty(description);
    let related_lessons: Vec<String> = search_lessons(storage, description, 3)?
        .into_iter()
        .map(|hit| hit.lesson_id)
        .collect();

    let items: Vec<TodoItem> = match todos {
        Some(specs) => specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| TodoItem {
                index: i + 1,
                description: spec.description,
                difficulty: spec.difficulty.unwrap_or(analysis.difficulty),
                status: TodoStatus::Pending,
                target_files: spec.target_files,
                depends_on: spec.depends_on,
            })
            .collect(),
        None => vec![TodoItem {
            index: 1,
            description: description.to_string(),
            difficulty: analysis.difficulty,
            status: TodoStatus::Pending,
            target_files: Vec::new(),
            depends_on: Vec::new(),
        }],
    };

    let _guard = storage.write_lock.lock();
    let task_id = next_id(&storage.tasks_dir(), "task")?;
    let now = Utc::now();

    let mut frontmatter = TaskFrontmatter::new(&task_id, description, analysis.difficulty);
    frontmatter.created_at = now;
    frontmatter.related_lessons = related_lessons.clone();

    let todo_list = items
        .iter()
        .map(render_item_line)
        .collect::<Vec<_>>()
        .join("\n");
    let body = format!("# TODO List\n{todo_list}\n\n# Footnote\nAuto-generated from user request");
    let file_path = storage.task_path(&task_id);
    storage.write_entity(&file_path, &frontmatter, &body)?;

    fs::create_dir_all(storage.task_dir(&task_id))?;
    for item in &items {
        write_todo_template(storage, &task_id, item, now)?;
    }

    let parallel = analyze_parallel_groups(&items);
    Ok(CreatedTask {
        task_id,
        file_path,
        difficulty: analysis.difficulty,
        suggested_model: analysis.suggested_model,
        todo_count: items.len(),
        related_lessons,
        analysis: parallel,
    })
}

fn render_item_line(item: &TodoItem) -> String {
    TodoLine {
        index: item.index,
        description: item.description.clone(),
        difficulty: item.difficulty,
        status: item.status,
    }
    .render()
}

fn write_todo_template(
    storage: &Storage,
    task_id: &str,
    todo: &TodoItem,
    created_at: DateTime<Utc>,
) -> Result<()> {
    let frontmatter = TodoFrontmatter {
        todo_id: todo.index,
        task_id: task_id.to_string(),
        description: todo.description.clone(),
        difficulty: todo.difficulty,
        status: todo.status,
        target_files: todo.target_files.clone(),
        depends_on: todo.depends_on.clone(),
        created_at,
        updated_at: created_at,
    };
    let body = format!(
        "# TODO #{}: {}\n\n\
         **Difficulty**: {} | **Status**: {} {}\n\n\
         ---\n\n\
         ## Progress Log\n\n\
         (progress entries are recorded here)\n\n\
         ---\n\n\
         ## Changed Files\n\n\
         (list of changed files)\n\n\
         ---\n\n\
         ## Notes\n\n\
         (additional notes)",
        todo.index,
        todo.description,
        todo.difficulty.label(),
        todo.status.glyph(),
        todo.status.label(),
    );
    storage.write_entity(&storage.todo_path(task_id, todo.index), &frontmatter, &body)
}

pub fn get_task_status(storage: &Storage, task_id: &str) -> Result<TaskDetail> {
    let Some((task, body)) = storage.read_entity::<TaskFrontmatter>(&storage.task_path(task_id))?
    else {
        return Ok(TaskDetail {
            task: None,
            todos: Vec::new(),
        });
    };
    Ok(TaskDetail {
        task: Some(task),
        todos: parse_todo_lines(&body),
    })
}

pub(crate) fn parse_todo_lines(body: &str) -> Vec<TodoLine> {
    body.lines().filter_map(TodoLine::parse).collect()
}

/// Rewrites a todo's glyph line in the task file, then mirrors the new
/// status into its detail file. Returns false when the task file or the
/// numbered line is missing.
pub fn update_todo(
    storage: &Storage,
    task_id: &str,
    todo_index: usize,
    status: TodoStatus,
) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    set_todo_line_status(storage, task_id, todo_index, status.glyph(), status.label())
}

/// Same line rewrite, driven by a captured result instead of a plain status
pub fn set_result_status(
    storage: &Storage,
    task_id: &str,
    todo_index: usize,
    status: ResultStatus,
) -> Result<bool> {
    let _guard = storage.write_lock.lock();
    set_todo_line_status(storage, task_id, todo_index, status.glyph(), status.label())
}

fn set_todo_line_status(
    storage: &Storage,
    task_id: &str,
    todo_index: usize,
    glyph: char,
    label: &str,
) -> Result<bool> {
    let path = storage.task_path(task_id);
    if !path.exists() {
        return Ok(false);
    }
    let content = fs::read_to_string(&path)?.replace("\r\n", "\n");
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let mut updated = false;
    for line in lines.iter_mut() {
        let Some(parsed) = TodoLine::parse(line) else {
            continue;
        };
        if parsed.index != todo_index {
            continue;
        }
        *line = format!(
            "{} - {}. {} ({})",
            glyph,
            parsed.index,
            parsed.description,
            parsed.difficulty.label()
        );
        updated = true;
        break;
    }
    if updated {
        fs::write(&path, lines.join("\n"))?;
        touch_todo_file(storage, task_id, todo_index, glyph, label)?;
    }
    Ok(updated)
}

// Best-effort status mirror into the todo detail file. Missing file, absent
// frontmatter keys, or a result-shaped file are all tolerated: only what is
// present gets rewritten.
fn touch_todo_file(
    storage: &Storage,
    task_id: &str,
    todo_index: usize,
    glyph: char,
    label: &str,
) -> Result<()> {
    let path = storage.todo_path(task_id, todo_index);
    if !path.exists() {
        return Ok(());
    }
    let content = fs::read_to_string(&path)?.replace("\r\n", "\n");
    let Some((yaml, body)) = split_frontmatter(&content) else {
        return Ok(());
    };
    let mut mapping: serde_yaml::Mapping = match serde_yaml::from_str(yaml) {
        Ok(mapping) => mapping,
        Err(err) => {
            debug!(path = %path.display(), %err, "skipping status mirror, frontmatter is not a mapping");
            return Ok(());
        }
    };
    let status_key = Value::from("status");
    if let Some(value) = mapping.get_mut(&status_key) {
        *value = Value::from(label);
    }
    let updated_key = Value::from("updatedAt");
    if let Some(value) = mapping.get_mut(&updated_key) {
        *value = Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    let body = rewrite_status_display(body, glyph, label);
    let yaml = serde_yaml::to_string(&mapping)?;
    fs::write(&path, format!("---\n{yaml}---\n\n{body}"))?;
    Ok(())
}

// Rewrites the `**Status**: ⏳ pending` display segment; leaves the body
// untouched when the marker or a recognizable glyph is missing
fn rewrite_status_display(body: &str, glyph: char, label: &str) -> String {
    const MARKER: &str = "**Status**: ";
    let Some(pos) = body.find(MARKER) else {
        return body.to_string();
    };
    let start = pos + MARKER.len();
    let rest = &body[start..];
    let Some(old_glyph) = rest.chars().next() else {
        return body.to_string();
    };
    if TodoStatus::from_glyph(old_glyph).is_none() {
        return body.to_string();
    }
    let after_glyph = &rest[old_glyph.len_utf8()..];
    let Some(after_space) = after_glyph.strip_prefix(' ') else {
        return body.to_string();
    };
    let word_len: usize = after_space
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    format!(
        "{}{} {}{}",
        &body[..start],
        glyph,
        label,
        &after_space[word_len..]
    )
}

/// Replaces the todo detail file with a result record
pub fn save_todo_result(
    storage: &Storage,
    task_id: &str,
    todo_id: usize,
    status: ResultStatus,
    summary: &str,
    details: &str,
    changed_files: Vec<String>,
) -> Result<PathBuf> {
    let _guard = storage.write_lock.lock();
    let frontmatter = TodoResultFrontmatter {
        task_id: task_id.to_string(),
        todo_id,
        status,
        summary: summary.to_string(),
        changed_files,
        completed_at: Utc::now(),
    };
    let path = storage.todo_path(task_id, todo_id);
    storage.write_entity(&path, &frontmatter, &format!("# Details\n\n{details}"))?;
    Ok(path)
}

pub fn generate_task_summary(storage: &Storage, task_id: &str) -> Result<String> {
    let detail = get_task_status(storage, task_id)?;
    let Some(task) = detail.task else {
        return Ok(format!("Task {task_id} not found"));
    };
    let heading = if task.status == TaskStatus::Completed {
        "Completed"
    } else {
        "In Progress"
    };
    let mut summary = format!("## Task [{task_id}] {heading}\n\n");
    summary.push_str(&format!("### Summary\n{}\n\n", task.task_desc));
    summary.push_str("### Completed Items\n");
    for todo in &detail.todos {
        summary.push_str(&format!(
            "- {} TODO #{}: {}\n",
            todo.status.glyph(),
            todo.index,
            todo.description
        ));
    }
    summary.push_str(&format!("\n### Details\n📁 .z-agent/{task_id}/\n"));
    Ok(summary)
}

/// Reads the checklist back as [`TodoItem`]s, pulling targetFiles and
/// dependsOn from each todo's detail file when one is readable
pub fn load_todo_items(storage: &Storage, task_id: &str) -> Result<TodoListing> {
    let path = storage.task_path(task_id);
    if !path.exists() {
        return Ok(TodoListing::Missing);
    }
    let content = fs::read_to_string(&path)?.replace("\r\n", "\n");
    let body = match split_frontmatter(&content) {
        Some((_, body)) => body.to_string(),
        None => content,
    };
    let Some(section) = h1_section(&body, "TODO List") else {
        return Ok(TodoListing::NoSection);
    };

    let mut todos = Vec::new();
    for line in section.lines() {
        let Some(parsed) = TodoLine::parse(line) else {
            continue;
        };
        let detail_path = storage.todo_path(task_id, parsed.index);
        let (target_files, depends_on) =
            match storage.read_entity::<TodoFrontmatter>(&detail_path)? {
                Some((detail, _)) => (detail.target_files, detail.depends_on),
                None => (Vec::new(), Vec::new()),
            };
        todos.push(TodoItem {
            index: parsed.index,
            description: parsed.description,
            difficulty: parsed.difficulty,
            status: parsed.status,
            target_files,
            depends_on,
        });
    }
    Ok(TodoListing::Todos(todos))
}

pub fn delete_task(storage: &Storage, task_id: &str) -> Result<DeleteResult> {
    let _guard = storage.write_lock.lock();
    delete_task_files(storage, task_id)
}

/// Removes the task file and its todo directory without taking the write
/// lock; composite deletes hold the lock once and call this per task
pub(crate) fn delete_task_files(storage: &Storage, task_id: &str) -> Result<DeleteResult> {
    let mut deleted_files = Vec::new();
    let task_path = storage.task_path(task_id);
    if task_path.exists() {
        fs::remove_file(&task_path)?;
        deleted_files.push(task_path.display().to_string());
    }
    let todo_dir = storage.task_dir(task_id);
    if todo_dir.exists() {
        for entry in fs::read_dir(&todo_dir)? {
            let path = entry?.path();
            fs::remove_file(&path)?;
            deleted_files.push(path.display().to_string());
        }
        fs::remove_dir(&todo_dir)?;
        deleted_files.push(todo_dir.display().to_string());
    }
    if deleted_files.is_empty() {
        return Ok(DeleteResult {
            success: false,
            message: format!("Task {task_id} not found."),
            deleted_files,
        });
    }
    Ok(DeleteResult {
        success: true,
        message: format!("Task {task_id} deleted"),
        deleted_files,
    })
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

    fn spec(description: &str, target_files: &[&str], depends_on: &[usize]) -> TodoSpec {
        TodoSpec {
            description: description.to_string(),
            difficulty: None,
            target_files: target_files.iter().map(|s| s.to_string()).collect(),
            depends_on: depends_on.to_vec(),
        }
    }

    #[test]
    fn creates_task_with_default_todo() {
        let (_dir, storage) = test_storage();
        let created = create_task(&storage, "translate the release notes", None).unwrap();
        assert_eq!(created.task_id, "task-001");
        assert_eq!(created.todo_count, 1);
        assert_eq!(created.difficulty, Difficulty::Low);

        let detail = get_task_status(&storage, "task-001").unwrap();
        let task = detail.task.unwrap();
        assert_eq!(task.task_desc, "translate the release notes");
        assert_eq!(detail.todos.len(), 1);
        assert_eq!(detail.todos[0].index, 1);
        assert_eq!(detail.todos[0].status, TodoStatus::Pending);
        assert!(storage.todo_path("task-001", 1).exists());
    }

    #[test]
    fn task_ids_increment() {
        let (_dir, storage) = test_storage();
        create_task(&storage, "first", None).unwrap();
        let second = create_task(&storage, "second", None).unwrap();
        assert_eq!(second.task_id, "task-002");

        // deleted ids leave gaps; allocation never back-fills them
        delete_task(&storage, "task-001").unwrap();
        let third = create_task(&storage, "third", None).unwrap();
        assert_eq!(third.task_id, "task-003");
    }

    #[test]
    fn update_todo_rewrites_line_and_detail_file() {
        let (_dir, storage) = test_storage();
        let created = create_task(
            &storage,
            "refactor the parser",
            Some(vec![spec("extract lexer", &["lexer.rs"], &[])]),
        )
        .unwrap();

        let updated = update_todo(&storage, &created.task_id, 1, TodoStatus::InProgress).unwrap();
        assert!(updated);

        let detail = get_task_status(&storage, &created.task_id).unwrap();
        assert_eq!(detail.todos[0].status, TodoStatus::InProgress);

        let todo_file =
            fs::read_to_string(storage.todo_path(&created.task_id, 1)).unwrap();
        assert!(todo_file.contains("status: in_progress"));
        assert!(todo_file.contains("**Status**: 🔄 in_progress"));
    }

    #[test]
    fn update_todo_reports_missing_targets() {
        let (_dir, storage) = test_storage();
        assert!(!update_todo(&storage, "task-404", 1, TodoStatus::Complete).unwrap());

        create_task(&storage, "one todo only", None).unwrap();
        assert!(!update_todo(&storage, "task-001", 9, TodoStatus::Complete).unwrap());
    }

    #[test]
    fn missing_task_yields_empty_detail() {
        let (_dir, storage) = test_storage();
        let detail = get_task_status(&storage, "task-999").unwrap();
        assert!(detail.task.is_none());
        assert!(detail.todos.is_empty());
    }

    #[test]
    fn result_record_replaces_detail_file() {
        let (_dir, storage) = test_storage();
        let created = create_task(&storage, "ship the fix", None).unwrap();

        let path = save_todo_result(
            &storage,
            &created.task_id,
            1,
            ResultStatus::Complete,
            "done",
            "all tests green",
            vec!["src/lib.rs".to_string()],
        )
        .unwrap();
        assert!(set_result_status(&storage, &created.task_id, 1, ResultStatus::Complete).unwrap());

        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("status: complete"));
        assert!(written.contains("# Details"));
        assert!(written.contains("all tests green"));

        let detail = get_task_status(&storage, &created.task_id).unwrap();
        assert_eq!(detail.todos[0].status, TodoStatus::Complete);
    }

    #[test]
    fn failed_result_parks_the_line_back_on_pending_glyph() {
        let (_dir, storage) = test_storage();
        let created = create_task(&storage, "try the migration", None).unwrap();
        save_todo_result(
            &storage,
            &created.task_id,
            1,
            ResultStatus::Failed,
            "rolled back",
            "constraint violation",
            Vec::new(),
        )
        .unwrap();
        assert!(set_result_status(&storage, &created.task_id, 1, ResultStatus::Failed).unwrap());

        let content = fs::read_to_string(storage.task_path(&created.task_id)).unwrap();
        assert!(content.contains("⏳ - 1. try the migration"));
        let todo_file = fs::read_to_string(storage.todo_path(&created.task_id, 1)).unwrap();
        assert!(todo_file.contains("status: failed"));
    }

    #[test]
    fn summary_lists_every_todo() {
        let (_dir, storage) = test_storage();
        let created = create_task(
            &storage,
            "two step task",
            Some(vec![spec("step one", &[], &[]), spec("step two", &[], &[])]),
        )
        .unwrap();
        update_todo(&storage, &created.task_id, 1, TodoStatus::Complete).unwrap();

        let summary = generate_task_summary(&storage, &created.task_id).unwrap();
        assert!(summary.starts_with("## Task [task-001] In Progress"));
        assert!(summary.contains("### Summary\ntwo step task"));
        assert!(summary.contains("- ✅ TODO #1: step one"));
        assert!(summary.contains("- ⏳ TODO #2: step two"));
        assert!(summary.contains(".z-agent/task-001/"));

        assert_eq!(
            generate_task_summary(&storage, "task-777").unwrap(),
            "Task task-777 not found"
        );
    }

    #[test]
    fn todo_listing_merges_detail_metadata() {
        let (_dir, storage) = test_storage();
        let created = create_task(
            &storage,
            "layered work",
            Some(vec![
                spec("write model", &["model.rs"], &[]),
                spec("wire it up", &["main.rs"], &[1]),
            ]),
        )
        .unwrap();

        let TodoListing::Todos(todos) = load_todo_items(&storage, &created.task_id).unwrap() else {
            panic!("expected todos");
        };
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].target_files, vec!["model.rs"]);
        assert_eq!(todos[1].depends_on, vec![1]);

        assert!(matches!(
            load_todo_items(&storage, "task-404").unwrap(),
            TodoListing::Missing
        ));
    }

    #[test]
    fn delete_task_removes_file_and_directory() {
        let (_dir, storage) = test_storage();
        let created = create_task(&storage, "soon gone", None).unwrap();
        let result = delete_task(&storage, &created.task_id).unwrap();
        assert!(result.success);
        // task file, one todo file, the directory
        assert_eq!(result.deleted_files.len(), 3);
        assert!(!storage.task_path(&created.task_id).exists());
        assert!(!storage.task_dir(&created.task_id).exists());

        let missing = delete_task(&storage, &created.task_id).unwrap();
        assert!(!missing.success);
        assert_eq!(missing.message, "Task task-001 not found.");
    }
}
