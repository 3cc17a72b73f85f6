// End-to-end flows through the public API, exercised the way the MCP
// handlers drive them

use std::fs;

use tempfile::TempDir;

use z_agent::error::StoreError;
use z_agent::fsops;
use z_agent::linker::{self, EntityKind};
use z_agent::models::{
    Difficulty, LessonCategory, PlanStatus, PlanTodo, Priority, ResultStatus, TaskFrontmatter,
    TaskStatus, TodoSpec, TodoStatus,
};
use z_agent::parallel::analyze_parallel_groups;
use z_agent::query::{self, QueryFilter};
use z_agent::storage::{init_storage, Storage, StorageState};
use z_agent::store::{self, AnswerLinks, PlanUpdate, TodoListing};

fn workspace() -> (TempDir, StorageState) {
    let dir = TempDir::new().unwrap();
    let storage = init_storage(dir.path(), false);
    storage.ensure_directories().unwrap();
    (dir, storage)
}

fn todo_spec(description: &str, target_files: &[&str], depends_on: &[usize]) -> TodoSpec {
    TodoSpec {
        description: description.to_string(),
        difficulty: None,
        target_files: target_files.iter().map(|s| s.to_string()).collect(),
        depends_on: depends_on.to_vec(),
    }
}

// Task status is only ever changed by an explicit frontmatter edit
fn mark_task(storage: &Storage, task_id: &str, status: TaskStatus) {
    let path = storage.task_path(task_id);
    let (mut fm, body) = storage
        .read_entity::<TaskFrontmatter>(&path)
        .unwrap()
        .unwrap();
    fm.status = status;
    storage.write_entity(&path, &fm, &body).unwrap();
}

#[test]
fn answer_plan_task_flow_links_the_whole_graph() {
    let (_dir, storage) = workspace();

    // ask: archive the answer
    let answer = store::save_answer(
        &storage,
        "Which queue should the importer use?",
        "A bounded mpsc channel; the importer applies backpressure upstream.",
        "bounded mpsc with backpressure",
        AnswerLinks::default(),
    )
    .unwrap();

    // planning: draft a plan that references the answer
    let plan = store::create_plan(
        &storage,
        "Importer queue",
        "replace the unbounded importer queue",
        vec![answer.answer_id.clone()],
    )
    .unwrap();
    assert!(linker::link_answer_to_plan(&storage, &answer.answer_id, &plan.plan_id).unwrap());
    assert!(store::update_plan(
        &storage,
        &plan.plan_id,
        PlanUpdate {
            status: Some(PlanStatus::Ready),
            todos: Some(vec![
                PlanTodo {
                    description: "Swap in the bounded channel".to_string(),
                    difficulty: Difficulty::Medium,
                },
                PlanTodo {
                    description: "Propagate backpressure errors".to_string(),
                    difficulty: Difficulty::High,
                },
            ]),
            content: None,
        },
    )
    .unwrap());

    // task: turn the plan's todos into a task and wire the links
    let (detail, _) = store::get_plan(&storage, &plan.plan_id).unwrap().unwrap();
    let specs: Vec<TodoSpec> = detail
        .todos
        .iter()
        .map(|t| TodoSpec {
            description: t.description.clone(),
            difficulty: Some(t.difficulty),
            target_files: vec![],
            depends_on: vec![],
        })
        .collect();
    let task = store::create_task(
        &storage,
        "replace the unbounded importer queue",
        Some(specs),
    )
    .unwrap();
    assert_eq!(task.todo_count, 2);
    assert!(linker::link_plan_to_task(&storage, &plan.plan_id, &task.task_id).unwrap());
    assert!(linker::link_answer_to_task(&storage, &answer.answer_id, &task.task_id).unwrap());

    // the plan moved to in_progress when the task attached
    let (detail, _) = store::get_plan(&storage, &plan.plan_id).unwrap().unwrap();
    assert_eq!(detail.status, PlanStatus::InProgress);
    assert_eq!(detail.linked_tasks, vec![task.task_id.clone()]);

    // every corner of the triangle sees the other two
    let from_answer = linker::get_related_items(&storage, EntityKind::Answer, &answer.answer_id)
        .unwrap()
        .unwrap();
    assert_eq!(from_answer.plans, vec![plan.plan_id.clone()]);
    assert_eq!(from_answer.tasks, vec![task.task_id.clone()]);
    let from_plan = linker::get_related_items(&storage, EntityKind::Plan, &plan.plan_id)
        .unwrap()
        .unwrap();
    assert_eq!(from_plan.answers, vec![answer.answer_id.clone()]);
    assert_eq!(from_plan.tasks, vec![task.task_id.clone()]);
    let from_task = linker::get_related_items(&storage, EntityKind::Task, &task.task_id)
        .unwrap()
        .unwrap();
    assert_eq!(from_task.answers, vec![answer.answer_id.clone()]);

    // work through the checklist
    assert!(store::update_todo(&storage, &task.task_id, 1, TodoStatus::Complete).unwrap());
    let open = query::get_plans_by_status(&storage, Some(PlanStatus::InProgress)).unwrap();
    assert_eq!(open[0].incomplete_tasks, vec![task.task_id.clone()]);

    store::save_todo_result(
        &storage,
        &task.task_id,
        2,
        ResultStatus::Complete,
        "channel swapped",
        "bounded channel in place, errors propagate",
        vec!["src/importer.rs".to_string()],
    )
    .unwrap();
    assert!(store::set_result_status(&storage, &task.task_id, 2, ResultStatus::Complete).unwrap());

    mark_task(&storage, &task.task_id, TaskStatus::Completed);
    let plans = query::get_plans_by_status(&storage, None).unwrap();
    assert!(plans[0].incomplete_tasks.is_empty());

    let summary = store::generate_task_summary(&storage, &task.task_id).unwrap();
    assert!(summary.starts_with(&format!("## Task [{}] Completed", task.task_id)));
    assert!(summary.contains("- ✅ TODO #1: Swap in the bounded channel"));
    assert!(summary.contains("- ✅ TODO #2: Propagate backpressure errors"));

    // the sweep takes the finished task; the plan stays, link and all
    let sweep = query::delete_completed_tasks(&storage).unwrap();
    assert_eq!(sweep.deleted_tasks, vec![task.task_id.clone()]);
    assert!(store::get_plan(&storage, &plan.plan_id).unwrap().is_some());
}

#[test]
fn recorded_lessons_resurface_on_matching_tasks() {
    let (_dir, storage) = workspace();
    let lesson = store::record_lesson(
        &storage,
        LessonCategory::Debugging,
        "serde_yaml rejects duplicate keys in frontmatter",
        "validate frontmatter before writing it",
        vec!["frontmatter".to_string(), "yaml".to_string()],
        vec![],
    )
    .unwrap();
    store::record_lesson(
        &storage,
        LessonCategory::Performance,
        "walkdir traversals slow down on huge trees",
        "prune ignored directories via filter_entry",
        vec!["walkdir".to_string()],
        vec![],
    )
    .unwrap();

    let task = store::create_task(&storage, "fix broken yaml frontmatter output", None).unwrap();
    assert_eq!(task.related_lessons, vec![lesson.clone()]);

    // the reference is persisted in the task frontmatter
    let detail = store::get_task_status(&storage, &task.task_id).unwrap();
    assert_eq!(detail.task.unwrap().related_lessons, vec![lesson]);
}

#[test]
fn dependency_waves_rebuild_from_the_todo_files() {
    let (_dir, storage) = workspace();
    let task = store::create_task(
        &storage,
        "split the codec",
        Some(vec![
            todo_spec("extract the encoder", &["src/encode.rs"], &[]),
            todo_spec("extract the decoder", &["src/decode.rs"], &[]),
            todo_spec("rewire the public api", &["src/lib.rs"], &[1, 2]),
        ]),
    )
    .unwrap();
    assert!(task.analysis.has_parallel_opportunity());

    // read the checklist back through the files, not the in-memory items
    let TodoListing::Todos(todos) = store::load_todo_items(&storage, &task.task_id).unwrap() else {
        panic!("expected a checklist");
    };
    let analysis = analyze_parallel_groups(&todos);
    assert_eq!(analysis.groups.len(), 2);
    assert_eq!(analysis.groups[0].todos, vec![1, 2]);
    assert!(analysis.groups[0].can_run_parallel);
    assert_eq!(analysis.groups[1].todos, vec![3]);
    assert!(analysis.unreachable.is_empty());

    // once the first wave is done its indexes leave the pending set, so the
    // dependent todo is reported as unschedulable rather than grouped
    store::update_todo(&storage, &task.task_id, 1, TodoStatus::Complete).unwrap();
    store::update_todo(&storage, &task.task_id, 2, TodoStatus::Complete).unwrap();
    let TodoListing::Todos(todos) = store::load_todo_items(&storage, &task.task_id).unwrap() else {
        panic!("expected a checklist");
    };
    let analysis = analyze_parallel_groups(&todos);
    assert!(analysis.groups.is_empty());
    assert_eq!(analysis.unreachable, vec![3]);
}

#[test]
fn bookkeeping_stays_out_of_project_file_operations() {
    let (_dir, storage) = workspace();
    store::create_task(&storage, "seed task", None).unwrap();
    store::add_memory(
        &storage,
        "repo uses git worktrees",
        vec!["git".to_string()],
        Priority::High,
    )
    .unwrap();
    assert!(fsops::write_file(&storage, "src/main.rs", "fn main() {}").success);

    // the .z-agent tree never leaks into project file operations
    let listing = fsops::list_dir(&storage, ".", true);
    assert!(listing.success);
    assert!(listing.entries.iter().all(|e| !e.starts_with(".z-agent")));
    assert!(listing.entries.contains(&"src/main.rs".to_string()));
    let hits = fsops::glob_files(&storage, "**/*.md", None);
    assert!(hits.success);
    assert!(hits.entries.is_empty());

    // while the store keeps seeing its entities
    let report = query::query_all(&storage, &QueryFilter::default()).unwrap();
    assert_eq!(report.summary.task_count, 1);
    assert_eq!(store::get_all_memories(&storage).unwrap().len(), 1);
}

#[test]
fn strict_mode_turns_bad_frontmatter_into_errors() {
    let dir = TempDir::new().unwrap();
    let lenient = init_storage(dir.path(), false);
    lenient.ensure_directories().unwrap();
    store::create_task(&lenient, "fine task", None).unwrap();

    // corrupt the frontmatter on disk, keep the checklist
    let path = lenient.task_path("task-001");
    fs::write(&path, "---\n: : not yaml [\n---\n\n# TODO List\n⏳ - 1. fine task (L)").unwrap();

    // lenient storage falls back to defaults and keeps going
    let detail = store::get_task_status(&lenient, "task-001").unwrap();
    assert_eq!(detail.task.unwrap().task_id, "");
    assert_eq!(detail.todos.len(), 1);

    // a strict handle over the same tree refuses the file
    let strict = init_storage(dir.path(), true);
    let err = store::get_task_status(&strict, "task-001").unwrap_err();
    assert!(matches!(err, StoreError::Malformed { .. }));
}
