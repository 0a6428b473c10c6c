// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entity payloads and the records the offline queue keeps about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full payload of one synchronized entity (a trip document).
///
/// `updated_at` is the entity's own modification time in milliseconds since
/// the Unix epoch; it is the only field compared when detecting conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub updated_at: i64,
    #[serde(default)]
    pub data: Value,
}

impl EntitySnapshot {
    pub fn new(id: impl Into<String>, updated_at: i64, data: Value) -> Self {
        EntitySnapshot { id: id.into(), updated_at, data }
    }

    /// Returns true if `self` was modified strictly after `other`.
    pub fn is_newer_than(&self, other: &EntitySnapshot) -> bool {
        self.updated_at > other.updated_at
    }
}

/// A deferred write waiting to be replayed against the remote store.
///
/// At most one entry exists per `entity_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub entity_id: String,
    pub snapshot: EntitySnapshot,
    /// Companion data replayed with the entity, e.g. view preferences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_snapshot: Option<Value>,
    /// Human-readable description of the edit.
    pub label: String,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Returns true once the entry has used up its attempts for automatic runs.
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempt_count >= max_attempts
    }

    pub fn has_failed(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Partial update applied to a queue entry.
///
/// `None` fields are left untouched. The entry keeps its queue position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueEntryPatch {
    pub snapshot: Option<EntitySnapshot>,
    pub aux_snapshot: Option<Option<Value>>,
    pub label: Option<String>,
    pub attempt_count: Option<u32>,
    pub last_error: Option<Option<String>>,
}

impl QueueEntryPatch {
    /// Patch recording one failed attempt.
    pub fn failed_attempt(attempt_count: u32, error: impl Into<String>) -> Self {
        QueueEntryPatch {
            attempt_count: Some(attempt_count),
            last_error: Some(Some(error.into())),
            ..Default::default()
        }
    }

    pub fn apply(self, entry: &mut QueueEntry) {
        if let Some(snapshot) = self.snapshot {
            entry.snapshot = snapshot;
        }
        if let Some(aux) = self.aux_snapshot {
            entry.aux_snapshot = aux;
        }
        if let Some(label) = self.label {
            entry.label = label;
        }
        if let Some(count) = self.attempt_count {
            entry.attempt_count = count;
        }
        if let Some(error) = self.last_error {
            entry.last_error = error;
        }
    }
}

/// Both sides of a replay that overwrote a newer server copy.
///
/// Created only during replay, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictBackupEntry {
    pub id: String,
    pub queue_entry_id: String,
    pub entity_id: String,
    pub server_snapshot: EntitySnapshot,
    pub queued_snapshot: EntitySnapshot,
    pub captured_at: DateTime<Utc>,
}

/// Published view of the offline queue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
    pub pending_count: usize,
    /// Entries carrying a `last_error`.
    pub failed_count: usize,
}

impl QueueSnapshot {
    pub fn from_entries(entries: Vec<QueueEntry>) -> Self {
        let pending_count = entries.len();
        let failed_count = entries.iter().filter(|e| e.has_failed()).count();
        QueueSnapshot { entries, pending_count, failed_count }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
