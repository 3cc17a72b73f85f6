// Memory model
// Small free-form notes with a priority that drives both list order and
// search ranking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Priority;

/// Frontmatter of a memory file (`.z-agent/memory/mem-XXX.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryFrontmatter {
    pub memory_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl Default for MemoryFrontmatter {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            memory_id: String::new(),
            created_at: now,
            updated_at: now,
            priority: Priority::default(),
            tags: Vec::new(),
        }
    }
}

impl MemoryFrontmatter {
    pub fn new(memory_id: &str, priority: Priority, tags: Vec<String>) -> Self {
        Self {
            memory_id: memory_id.to_string(),
            priority,
            tags,
            ..Default::default()
        }
    }
}
