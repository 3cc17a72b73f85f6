// Memory store: small prioritized notes under .z-agent/memory/
// Priority drives both the listing order and the search ranking

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{MemoryFrontmatter, Priority};
use crate::storage::{
    entity_files, h1_section_to_end, next_id, replace_h1_section_to_end, Storage,
};
use crate::store::OpResult;

/// One memory with its content section inlined
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryView {
    pub memory_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SavedMemory {
    pub memory_id: String,
    pub file_path: PathBuf,
}

/// Patch for an existing memory; absent fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
}

pub fn add_memory(
    storage: &Storage,
    content: &str,
    tags: Vec<String>,
    priority: Priority,
) -> Result<SavedMemory> {
    let _guard = storage.write_lock.lock();
    let memory_id = next_id(&storage.memory_dir(), "mem")?;
    let frontmatter = MemoryFrontmatter::new(&memory_id, priority, tags);
    let body = format!("# Content\n{content}");
    let file_path = storage.memory_path(&memory_id);
    storage.write_entity(&file_path, &frontmatter, &body)?;
    Ok(SavedMemory {
        memory_id,
        file_path,
    })
}

pub fn get_memory(storage: &Storage, memory_id: &str) -> Result<Option<MemoryView>> {
    let path = storage.memory_path(memory_id);
    let Some((frontmatter, body)) = storage.read_entity::<MemoryFrontmatter>(&path)? else {
        return Ok(None);
    };
    Ok(Some(MemoryView {
        memory_id: memory_id.to_string(),
        content: h1_section_to_end(&body, "Content").unwrap_or_default(),
        tags: frontmatter.tags,
        priority: frontmatter.priority,
        created_at: frontmatter.created_at,
        updated_at: frontmatter.updated_at,
    }))
}

/// All memories, highest priority first, most recently updated first within
/// the same priority
pub fn get_all_memories(storage: &Storage) -> Result<Vec<MemoryView>> {
    let mut memories = Vec::new();
    for (memory_id, _) in entity_files(&storage.memory_dir(), "mem")? {
        if let Some(view) = get_memory(storage, &memory_id)? {
            memories.push(view);
        }
    }
    memories.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
    Ok(memories)
}

pub fn update_memory(storage: &Storage, memory_id: &str, updates: MemoryUpdate) -> Result<OpResult> {
    let _guard = storage.write_lock.lock();
    let path = storage.memory_path(memory_id);
    let Some((mut frontmatter, mut body)) = storage.read_entity::<MemoryFrontmatter>(&path)? else {
        return Ok(OpResult {
            success: false,
            message: format!("Memory {memory_id} not found"),
        });
    };
    frontmatter.updated_at = Utc::now();
    if let Some(priority) = updates.priority {
        frontmatter.priority = priority;
    }
    if let Some(tags) = updates.tags {
        frontmatter.tags = tags;
    }
    if let Some(content) = &updates.content {
        if let Some(replaced) = replace_h1_section_to_end(&body, "Content", content) {
            body = replaced;
        }
    }
    storage.write_entity(&path, &frontmatter, &body)?;
    Ok(OpResult {
        success: true,
        message: format!("Memory {memory_id} updated"),
    })
}

pub fn delete_memory(storage: &Storage, memory_id: &str) -> Result<OpResult> {
    let _guard = storage.write_lock.lock();
    let path = storage.memory_path(memory_id);
    if !path.exists() {
        return Ok(OpResult {
            success: false,
            message: format!("Memory {memory_id} not found"),
        });
    }
    fs::remove_file(&path)?;
    Ok(OpResult {
        success: true,
        message: format!("Memory {memory_id} deleted"),
    })
}

/// Word search over tags and content. High and medium priority memories
/// carry a base score, so they surface even without a direct word hit.
pub fn search_memories(storage: &Storage, query: &str, limit: usize) -> Result<Vec<MemoryView>> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();

    let mut scored: Vec<(i32, MemoryView)> = Vec::new();
    for memory in get_all_memories(storage)? {
        let mut score = memory.priority.search_bonus();
        let content = memory.content.to_lowercase();
        for word in &words {
            if memory
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(word))
            {
                score += 3;
            }
            if content.contains(word) {
                score += 1;
            }
        }
        if score > 0 {
            scored.push((score, memory));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    Ok(scored.into_iter().map(|(_, memory)| memory).collect())
}

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

    #[test]
    fn add_and_get_round_trip() {
        let (_dir, storage) = test_storage();
        let saved = add_memory(
            &storage,
            "Always run the linter before pushing",
            vec!["workflow".to_string()],
            Priority::High,
        )
        .unwrap();
        assert_eq!(saved.memory_id, "mem-001");
        assert!(saved.file_path.exists());

        let view = get_memory(&storage, "mem-001").unwrap().unwrap();
        assert_eq!(view.content, "Always run the linter before pushing");
        assert_eq!(view.tags, vec!["workflow"]);
        assert_eq!(view.priority, Priority::High);
    }

    #[test]
    fn listing_orders_by_priority_then_recency() {
        let (_dir, storage) = test_storage();
        add_memory(&storage, "low note", vec![], Priority::Low).unwrap();
        add_memory(&storage, "high note", vec![], Priority::High).unwrap();
        add_memory(&storage, "medium note", vec![], Priority::Medium).unwrap();

        let all = get_all_memories(&storage).unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["high note", "medium note", "low note"]);
    }

    #[test]
    fn update_patches_content_and_priority() {
        let (_dir, storage) = test_storage();
        add_memory(&storage, "old text", vec![], Priority::Low).unwrap();

        let result = update_memory(
            &storage,
            "mem-001",
            MemoryUpdate {
                content: Some("new text".to_string()),
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Memory mem-001 updated");

        let view = get_memory(&storage, "mem-001").unwrap().unwrap();
        assert_eq!(view.content, "new text");
        assert_eq!(view.priority, Priority::High);
        assert!(view.updated_at >= view.created_at);
    }

    #[test]
    fn update_missing_memory_reports_failure() {
        let (_dir, storage) = test_storage();
        let result = update_memory(&storage, "mem-999", MemoryUpdate::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "Memory mem-999 not found");
    }

    #[test]
    fn delete_removes_the_file() {
        let (_dir, storage) = test_storage();
        let saved = add_memory(&storage, "ephemeral", vec![], Priority::Low).unwrap();
        let result = delete_memory(&storage, "mem-001").unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Memory mem-001 deleted");
        assert!(!saved.file_path.exists());

        let again = delete_memory(&storage, "mem-001").unwrap();
        assert!(!again.success);
    }

    #[test]
    fn search_weights_tags_over_content_and_applies_priority_bonus() {
        let (_dir, storage) = test_storage();
        add_memory(
            &storage,
            "uses sqlite for the cache",
            vec!["database".to_string()],
            Priority::Low,
        )
        .unwrap();
        add_memory(&storage, "mentions database once", vec![], Priority::Low).unwrap();
        add_memory(&storage, "unrelated reminder", vec![], Priority::High).unwrap();
        add_memory(&storage, "also unrelated", vec![], Priority::Low).unwrap();

        let hits = search_memories(&storage, "database", 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|m| m.memory_id.as_str()).collect();
        // high priority base score (5) > tag match (3) > content match (1);
        // the unrelated low priority memory scores 0 and drops out
        assert_eq!(ids, vec!["mem-003", "mem-001", "mem-002"]);
    }

    #[test]
    fn search_respects_the_limit() {
        let (_dir, storage) = test_storage();
        for i in 0..5 {
            add_memory(&storage, &format!("note {i} about caching"), vec![], Priority::Low)
                .unwrap();
        }
        let hits = search_memories(&storage, "caching", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
