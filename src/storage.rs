// Filesystem-based storage layer for z-agent
// Markdown files + YAML frontmatter under a project-local .z-agent/ tree

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Directory names created under `.z-agent/`
pub const SUBDIRS: [&str; 10] = [
    "tasks",
    "lessons",
    "scripts",
    "agents",
    "skills",
    "templates",
    "plans",
    "answers",
    "temp",
    "memory",
];

// ============================================
// STORAGE STATE
// ============================================

/// Main storage handle
pub struct Storage {
    /// Project directory the `.z-agent/` tree lives under
    pub project_root: PathBuf,
    /// Fail on malformed frontmatter instead of falling back to defaults
    pub strict: bool,
    /// Serializes read-modify-write cycles across tool calls
    pub write_lock: Mutex<()>,
}

pub type StorageState = Arc<Storage>;

/// Initialize storage rooted at the given project directory
pub fn init_storage(project_root: impl Into<PathBuf>, strict: bool) -> StorageState {
    Arc::new(Storage::new(project_root, strict))
}

impl Storage {
    pub fn new(project_root: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            project_root: project_root.into(),
            strict,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates the `.z-agent/` tree; idempotent, called on every tool call
    pub fn ensure_directories(&self) -> Result<()> {
        for name in SUBDIRS {
            fs::create_dir_all(self.root().join(name))?;
        }
        Ok(())
    }

    // ============================================
    // PATH HELPERS
    // ============================================

    /// Root of the bookkeeping tree: `{project_root}/.z-agent`
    pub fn root(&self) -> PathBuf {
        self.project_root.join(".z-agent")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root().join("tasks")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root().join("plans")
    }

    pub fn lessons_dir(&self) -> PathBuf {
        self.root().join("lessons")
    }

    pub fn answers_dir(&self) -> PathBuf {
        self.root().join("answers")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root().join("memory")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root().join("temp")
    }

    pub fn task_path(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(format!("{}.md", task_id))
    }

    /// Directory holding a task's per-todo detail files; sits directly
    /// under the root, next to the tasks dir, keyed by task id
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root().join(task_id)
    }

    pub fn todo_path(&self, task_id: &str, index: usize) -> PathBuf {
        self.task_dir(task_id).join(format!("todo-{:03}.md", index))
    }

    pub fn plan_path(&self, plan_id: &str) -> PathBuf {
        self.plans_dir().join(format!("{}.md", plan_id))
    }

    pub fn lesson_path(&self, lesson_id: &str) -> PathBuf {
        self.lessons_dir().join(format!("{}.md", lesson_id))
    }

    pub fn answer_path(&self, answer_id: &str) -> PathBuf {
        self.answers_dir().join(format!("{}.md", answer_id))
    }

    pub fn memory_path(&self, memory_id: &str) -> PathBuf {
        self.memory_dir().join(format!("{}.md", memory_id))
    }

    /// Resolves a user-supplied path against the project root; absolute
    /// paths pass through untouched
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }

    // ============================================
    // ENTITY FILES
    // ============================================

    /// Reads and parses an entity file; `Ok(None)` when the file is absent.
    /// Malformed frontmatter falls back to defaults unless strict mode is on.
    pub fn read_entity<T>(&self, path: &Path) -> Result<Option<(T, String)>>
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        match parse_frontmatter::<T>(&content) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(reason) if self.strict => Err(StoreError::Malformed {
                path: path.to_path_buf(),
                reason,
            }),
            Err(reason) => {
                debug!(path = %path.display(), %reason, "malformed frontmatter, using defaults");
                let body = match split_frontmatter(&content) {
                    Some((_, body)) => body.to_string(),
                    None => content.trim().to_string(),
                };
                Ok(Some((T::default(), body)))
            }
        }
    }

    /// Writes an entity file, creating parent directories as needed
    pub fn write_entity<T: Serialize>(&self, path: &Path, frontmatter: &T, body: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, to_markdown(frontmatter, body)?)?;
        Ok(())
    }
}

// ============================================
// FRONTMATTER PARSING
// ============================================

/// Splits markdown into raw YAML frontmatter and trimmed body; `None` when
/// the leading `---` fence is missing or unterminated
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.trim();
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let yaml = rest[..end].trim();
    let body = rest[end + 4..].trim();
    Some((yaml, body))
}

/// Parses YAML frontmatter into a typed record plus the trimmed body
pub fn parse_frontmatter<T: DeserializeOwned>(
    content: &str,
) -> std::result::Result<(T, String), String> {
    let (yaml, body) =
        split_frontmatter(content).ok_or_else(|| "missing frontmatter fence".to_string())?;
    let frontmatter: T = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    Ok((frontmatter, body.to_string()))
}

/// Serializes frontmatter + body back to markdown
pub fn to_markdown<T: Serialize>(frontmatter: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{}---\n\n{}", yaml, body))
}

// ============================================
// ID ALLOCATION
// ============================================

/// Extracts the numeric part of an id-style filename (`task-012.md` -> 12)
pub fn parse_id_number(filename: &str, prefix: &str) -> Option<u32> {
    let digits = filename
        .strip_suffix(".md")?
        .strip_prefix(prefix)?
        .strip_prefix('-')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Allocates the next sequential id in a directory, zero-padded to 3 digits
pub fn next_id(dir: &Path, prefix: &str) -> Result<String> {
    let mut max = 0u32;
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(n) = entry
                .file_name()
                .to_str()
                .and_then(|name| parse_id_number(name, prefix))
            {
                max = max.max(n);
            }
        }
    }
    Ok(format!("{}-{:03}", prefix, max + 1))
}

/// Lists the `{prefix}-NNN.md` files in a directory as (id, path) pairs
/// sorted by filename; a missing directory is just empty
pub fn entity_files(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if parse_id_number(name, prefix).is_none() {
            continue;
        }
        let Some(id) = name.strip_suffix(".md") else {
            continue;
        };
        files.push((id.to_string(), path));
    }
    files.sort();
    Ok(files)
}

// ============================================
// MARKDOWN SECTIONS
// ============================================

/// Finds the byte offset of a heading line, at the start of the body or
/// right after a newline, with nothing else on the line
fn find_heading(body: &str, heading: &str) -> Option<usize> {
    if body.starts_with(heading) {
        let after = &body[heading.len()..];
        if after.is_empty() || after.starts_with('\n') || after.starts_with('\r') {
            return Some(0);
        }
    }
    let needle = format!("\n{}", heading);
    let mut from = 0;
    while let Some(pos) = body[from..].find(&needle) {
        let start = from + pos + 1;
        let after = &body[start + heading.len()..];
        if after.is_empty() || after.starts_with('\n') || after.starts_with('\r') {
            return Some(start);
        }
        from = start;
    }
    None
}

// `stop: None` means the section runs all the way to the end of the body
fn section_with(body: &str, heading: &str, stop: Option<&str>) -> Option<String> {
    let start = find_heading(body, heading)?;
    let after_heading = start + heading.len();
    let content_start = match body[after_heading..].find('\n') {
        Some(nl) => after_heading + nl + 1,
        None => return Some(String::new()),
    };
    let content = &body[content_start..];
    let end = stop
        .and_then(|s| content.find(s))
        .unwrap_or(content.len());
    Some(content[..end].trim().to_string())
}

fn replace_section_with(
    body: &str,
    heading: &str,
    stop: Option<&str>,
    new_content: &str,
) -> Option<String> {
    let start = find_heading(body, heading)?;
    let after_heading = start + heading.len();
    let content_start = match body[after_heading..].find('\n') {
        Some(nl) => after_heading + nl + 1,
        None => body.len(),
    };
    let tail_start = stop
        .and_then(|s| body[content_start..].find(s))
        .map(|e| content_start + e)
        .unwrap_or(body.len());
    let mut out = String::with_capacity(body.len() + new_content.len());
    out.push_str(&body[..content_start]);
    if content_start == body.len() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(new_content);
    out.push('\n');
    out.push_str(&body[tail_start..]);
    Some(out)
}

/// Extracts the trimmed content of an h1 section; the section runs until
/// the next h1 heading or the end of the body
pub fn h1_section(body: &str, title: &str) -> Option<String> {
    section_with(body, &format!("# {}", title), Some("\n# "))
}

/// Extracts the trimmed content of an h2 section
pub fn h2_section(body: &str, title: &str) -> Option<String> {
    section_with(body, &format!("## {}", title), Some("\n## "))
}

/// Extracts an h1 section that runs to the end of the body, ignoring any
/// heading-like lines inside it; for bodies whose last section this is
pub fn h1_section_to_end(body: &str, title: &str) -> Option<String> {
    section_with(body, &format!("# {}", title), None)
}

/// Replaces the content of an h1 section, keeping the heading and the rest
/// of the body intact; `None` when the heading is missing
pub fn replace_h1_section(body: &str, title: &str, new_content: &str) -> Option<String> {
    replace_section_with(body, &format!("# {}", title), Some("\n# "), new_content)
}

/// Replaces the content of an h2 section
pub fn replace_h2_section(body: &str, title: &str, new_content: &str) -> Option<String> {
    replace_section_with(body, &format!("## {}", title), Some("\n## "), new_content)
}

/// Replaces everything from an h1 heading down to the end of the body
pub fn replace_h1_section_to_end(body: &str, title: &str, new_content: &str) -> Option<String> {
    replace_section_with(body, &format!("# {}", title), None, new_content)
}
