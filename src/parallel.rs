// Groups a task's todos into waves that can run concurrently.
// A todo is schedulable once every index in its dependsOn list has been
// placed in an earlier wave; within a wave, todos must not touch the same
// target file. Only pending and in-progress todos participate.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{TodoItem, TodoStatus};

/// One wave of todos with no dependency or file conflicts between them
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelGroup {
    pub group_index: usize,
    pub todos: Vec<usize>,
    pub can_run_parallel: bool,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelAnalysis {
    pub groups: Vec<ParallelGroup>,
    /// Todos that can never be scheduled: dependency cycles, or
    /// dependencies on items that are not pending anymore
    pub unreachable: Vec<usize>,
}

impl ParallelAnalysis {
    pub fn has_parallel_opportunity(&self) -> bool {
        self.groups.iter().any(|g| g.can_run_parallel)
    }
}

pub fn analyze_parallel_groups(todos: &[TodoItem]) -> ParallelAnalysis {
    let pending: Vec<&TodoItem> = todos
        .iter()
        .filter(|t| matches!(t.status, TodoStatus::Pending | TodoStatus::InProgress))
        .collect();

    let mut groups = Vec::new();
    let mut scheduled: HashSet<usize> = HashSet::new();
    let mut group_index = 1;

    while scheduled.len() < pending.len() {
        let executable: Vec<&TodoItem> = pending
            .iter()
            .filter(|t| {
                !scheduled.contains(&t.index)
                    && t.depends_on.iter().all(|dep| scheduled.contains(dep))
            })
            .copied()
            .collect();
        if executable.is_empty() {
            // the remainder is stuck behind a cycle or a missing dependency
            break;
        }

        let mut members = Vec::new();
        let mut used_files: HashSet<&str> = HashSet::new();
        for todo in executable {
            if todo
                .target_files
                .iter()
                .any(|f| used_files.contains(f.as_str()))
            {
                continue;
            }
            members.push(todo.index);
            for file in &todo.target_files {
                used_files.insert(file);
            }
        }

        // the first executable todo never conflicts, so members is non-empty
        for &index in &members {
            scheduled.insert(index);
        }
        let can_run_parallel = members.len() > 1;
        groups.push(ParallelGroup {
            group_index,
            todos: members,
            can_run_parallel,
            reason: if can_run_parallel {
                "No file conflicts, can run in parallel"
            } else {
                "Single task"
            },
        });
        group_index += 1;
    }

    let unreachable = pending
        .iter()
        .filter(|t| !scheduled.contains(&t.index))
        .map(|t| t.index)
        .collect();

    ParallelAnalysis { groups, unreachable }
}

// ============================================
// TESTS
// ============================================
