// Task and todo models
// A task is one markdown file plus a directory of per-todo detail files;
// the TODO list inside the task body is the source of truth for status

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Difficulty, ResultStatus, TaskStatus, TodoStatus};

/// Frontmatter of a task file (`.z-agent/tasks/task-XXX.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFrontmatter {
    pub task_id: String,
    pub task_desc: String,
    pub created_at: DateTime<Utc>,
    pub difficulty: Difficulty,
    pub status: TaskStatus,
    pub related_lessons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_answers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_plan: Option<String>,
}

impl Default for TaskFrontmatter {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            task_desc: String::new(),
            created_at: Utc::now(),
            difficulty: Difficulty::default(),
            status: TaskStatus::default(),
            related_lessons: Vec::new(),
            related_answers: None,
            linked_plan: None,
        }
    }
}

impl TaskFrontmatter {
    pub fn new(task_id: &str, task_desc: &str, difficulty: Difficulty) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_desc: task_desc.to_string(),
            difficulty,
            ..Default::default()
        }
    }
}

/// Frontmatter of a todo detail file (`.z-agent/task-XXX/todo-YYY.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoFrontmatter {
    pub todo_id: usize,
    pub task_id: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub status: TodoStatus,
    pub target_files: Vec<String>,
    pub depends_on: Vec<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TodoFrontmatter {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            todo_id: 0,
            task_id: String::new(),
            description: String::new(),
            difficulty: Difficulty::default(),
            status: TodoStatus::default(),
            target_files: Vec::new(),
            depends_on: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Frontmatter written when a todo's result is captured; this replaces the
/// todo detail file wholesale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoResultFrontmatter {
    pub task_id: String,
    pub todo_id: usize,
    pub status: ResultStatus,
    pub summary: String,
    pub changed_files: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// One todo requested at task creation time
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoSpec {
    pub description: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub target_files: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

/// One parsed line of a task file's `# TODO List` section, e.g.
/// `⏳ - 1. Wire up the config loader (M)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoLine {
    pub index: usize,
    pub description: String,
    pub difficulty: Difficulty,
    pub status: TodoStatus,
}

impl TodoLine {
    /// Parses a TODO list line; non-todo lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut chars = line.chars();
        let status = TodoStatus::from_glyph(chars.next()?)?;
        let rest = chars.as_str().trim_start().strip_prefix('-')?.trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let index: usize = digits.parse().ok()?;
        let rest = rest[digits.len()..].strip_prefix('.')?.trim();
        // trailing "(H)" difficulty marker is optional; anything else stays
        // part of the description
        let (description, difficulty) = match rest.rfind('(') {
            Some(pos) if rest.ends_with(')') && pos + 3 == rest.len() => {
                let marker = rest[pos + 1..].chars().next()?;
                let before = rest[..pos].trim_end();
                match Difficulty::from_label(marker) {
                    Some(d) if !before.is_empty() => (before.to_string(), d),
                    _ => (rest.to_string(), Difficulty::default()),
                }
            }
            _ => (rest.to_string(), Difficulty::default()),
        };
        if description.is_empty() {
            return None;
        }
        Some(Self {
            index,
            description,
            difficulty,
            status,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{} - {}. {} ({})",
            self.status.glyph(),
            self.index,
            self.description,
            self.difficulty.label()
        )
    }
}

/// A todo line merged with its detail-file metadata, the unit the parallel
/// analyzer works on
#[derive(Debug, Clone)]
pub struct TodoItem {
    pub index: usize,
    pub description: String,
    pub difficulty: Difficulty,
    pub status: TodoStatus,
    pub target_files: Vec<String>,
    pub depends_on: Vec<usize>,
}
