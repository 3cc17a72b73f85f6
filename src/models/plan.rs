// Plan model
// A plan is a single markdown file with h2 sections; its TODO List section
// holds numbered candidate todos that later seed a task

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Difficulty, PlanStatus};

/// Frontmatter of a plan file (`.z-agent/plans/PLAN-XXX.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanFrontmatter {
    pub plan_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: PlanStatus,
    pub difficulty: Difficulty,
    pub linked_tasks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_answers: Option<Vec<String>>,
}

impl Default for PlanFrontmatter {
    fn default() -> Self {
        Self {
            plan_id: String::new(),
            title: String::new(),
            description: String::new(),
            created_at: Utc::now(),
            status: PlanStatus::default(),
            difficulty: Difficulty::default(),
            linked_tasks: Vec::new(),
            related_answers: None,
        }
    }
}

impl PlanFrontmatter {
    pub fn new(
        plan_id: &str,
        title: &str,
        description: &str,
        difficulty: Difficulty,
        related_answers: Vec<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            difficulty,
            related_answers: Some(related_answers),
            ..Default::default()
        }
    }
}

/// One numbered entry of a plan's `## TODO List` section, e.g.
/// `1. Split the writer into two passes (H)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanTodo {
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl PlanTodo {
    /// Parses a numbered plan todo line; the difficulty marker is required
    /// here, placeholder text without one is skipped
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let rest = line[digits.len()..].strip_prefix('.')?.trim();
        let pos = rest.rfind('(')?;
        if !rest.ends_with(')') || pos + 3 != rest.len() {
            return None;
        }
        let difficulty = Difficulty::from_label(rest[pos + 1..].chars().next()?)?;
        let description = rest[..pos].trim_end();
        if description.is_empty() {
            return None;
        }
        Some(Self {
            description: description.to_string(),
            difficulty,
        })
    }

    pub fn render(&self, number: usize) -> String {
        format!("{}. {} ({})", number, self.description, self.difficulty.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_numbered_todo_line() {
        let todo = PlanTodo::parse("2. Split the writer into two passes (H)").unwrap();
        assert_eq!(todo.description, "Split the writer into two passes");
        assert_eq!(todo.difficulty, Difficulty::High);
    }

    #[test]
    fn skips_lines_without_a_difficulty_marker() {
        assert!(PlanTodo::parse("1. Placeholder entry").is_none());
        assert!(PlanTodo::parse("(to be filled in during planning)").is_none());
    }

    #[test]
    fn render_numbers_from_the_caller() {
        let todo = PlanTodo {
            description: "Wire the cache".to_string(),
            difficulty: Difficulty::Low,
        };
        assert_eq!(todo.render(3), "3. Wire the cache (L)");
    }

    #[test]
    fn frontmatter_defaults_to_draft() {
        let fm = PlanFrontmatter::new("PLAN-001", "Cache", "Add a cache", Difficulty::Medium, vec![]);
        assert_eq!(fm.status, PlanStatus::Draft);
        assert_eq!(fm.related_answers, Some(vec![]));
        assert!(fm.linked_tasks.is_empty());
    }
}
