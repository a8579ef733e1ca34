//! Priority table
//!
//! Per task type, the caller's ordered preference of (provider, model) pairs. Ranks must
//! be unique within a task type but need not be contiguous. Entries pointing at a
//! provider without a credential stay in the table; the client skips them at call time.

use super::types::TaskType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityEntry {
    pub provider_id: String,
    pub model_id: String,
    pub rank: u32,
}

impl PriorityEntry {
    pub fn new(provider_id: &str, model_id: &str, rank: u32) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model_id: model_id.to_string(),
            rank,
        }
    }

    fn same_target(&self, provider_id: &str, model_id: &str) -> bool {
        self.provider_id == provider_id && self.model_id == model_id
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PriorityError {
    #[error("rank {rank} is already used for {task} models")]
    DuplicateRank { task: TaskType, rank: u32 },
    #[error("{provider_id}/{model_id} is already listed for {task} models")]
    DuplicateEntry {
        task: TaskType,
        provider_id: String,
        model_id: String,
    },
}

/// Runtime-mutable ordered model preferences, shared read-mostly across workers
#[derive(Default)]
pub struct PriorityTable {
    entries: RwLock<HashMap<TaskType, Vec<PriorityEntry>>>,
}

impl PriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default preferences over the built-in provider catalog
    pub fn builtin_defaults() -> Self {
        let entries = HashMap::from([
            (
                TaskType::Chat,
                ranked(&[
                    ("openai", "gpt-4o-mini"),
                    ("deepseek", "deepseek-chat"),
                    ("qwen", "qwen-plus"),
                    ("zhipu", "glm-4-flash"),
                    ("xai", "grok-4-1-fast"),
                ]),
            ),
            (
                TaskType::Vision,
                ranked(&[
                    ("openai", "gpt-4o"),
                    ("qwen", "qwen-vl-plus"),
                    ("zhipu", "glm-4v-flash"),
                    ("xai", "grok-2-vision-1212"),
                ]),
            ),
        ]);
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskType, Vec<PriorityEntry>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskType, Vec<PriorityEntry>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Rank-ordered snapshot of the entries for a task type
    pub fn entries(&self, task: TaskType) -> Vec<PriorityEntry> {
        self.read().get(&task).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self, task: TaskType) -> bool {
        self.read().get(&task).map_or(true, |e| e.is_empty())
    }

    /// Replace all entries for a task type
    pub fn set_entries(
        &self,
        task: TaskType,
        mut entries: Vec<PriorityEntry>,
    ) -> Result<(), PriorityError> {
        entries.sort_by_key(|e| e.rank);
        for pair in entries.windows(2) {
            if pair[0].rank == pair[1].rank {
                return Err(PriorityError::DuplicateRank {
                    task,
                    rank: pair[0].rank,
                });
            }
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i]
                .iter()
                .any(|e| e.same_target(&entry.provider_id, &entry.model_id))
            {
                return Err(PriorityError::DuplicateEntry {
                    task,
                    provider_id: entry.provider_id.clone(),
                    model_id: entry.model_id.clone(),
                });
            }
        }

        self.write().insert(task, entries);
        Ok(())
    }

    /// Replace all entries for a task type; rank is the position in `order`
    pub fn set_order(&self, task: TaskType, order: &[(&str, &str)]) -> Result<(), PriorityError> {
        self.set_entries(task, ranked(order))
    }

    /// Add one entry, keeping rank order
    pub fn insert(&self, task: TaskType, entry: PriorityEntry) -> Result<(), PriorityError> {
        let mut guard = self.write();
        let list = guard.entry(task).or_default();

        if list.iter().any(|e| e.rank == entry.rank) {
            return Err(PriorityError::DuplicateRank {
                task,
                rank: entry.rank,
            });
        }
        if list
            .iter()
            .any(|e| e.same_target(&entry.provider_id, &entry.model_id))
        {
            return Err(PriorityError::DuplicateEntry {
                task,
                provider_id: entry.provider_id,
                model_id: entry.model_id,
            });
        }

        let pos = list.partition_point(|e| e.rank < entry.rank);
        list.insert(pos, entry);
        Ok(())
    }

    /// Remove an entry. Returns `false` if it was not listed.
    pub fn remove(&self, task: TaskType, provider_id: &str, model_id: &str) -> bool {
        let mut guard = self.write();
        let Some(list) = guard.get_mut(&task) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| !e.same_target(provider_id, model_id));
        list.len() != before
    }

    /// Move an entry to the front. Ranks are renumbered from zero.
    pub fn promote(&self, task: TaskType, provider_id: &str, model_id: &str) -> bool {
        let mut guard = self.write();
        let Some(list) = guard.get_mut(&task) else {
            return false;
        };
        let Some(pos) = list
            .iter()
            .position(|e| e.same_target(provider_id, model_id))
        else {
            return false;
        };

        let entry = list.remove(pos);
        list.insert(0, entry);
        for (rank, e) in list.iter_mut().enumerate() {
            e.rank = rank as u32;
        }
        true
    }
}

/// Entries ranked by their position in `order`
fn ranked(order: &[(&str, &str)]) -> Vec<PriorityEntry> {
    order
        .iter()
        .enumerate()
        .map(|(rank, (provider, model))| PriorityEntry::new(provider, model, rank as u32))
        .collect()
}
