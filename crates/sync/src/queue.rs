// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline change queue.
//!
//! Writes that could not complete inline wait here until the sync manager
//! replays them. The queue holds at most one entry per entity (a newer
//! enqueue replaces the older one) and is bounded; the oldest entries are
//! evicted first. A second bounded list keeps conflict backups, newest first.
//!
//! Both lists live in memory and are written through to the key-value store
//! as JSON arrays after every mutation. A failed write is logged and the
//! in-memory state still advances; the next successful write persists it.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use ts_core::{
    ClockSource, ConflictBackupEntry, EntitySnapshot, KeyValueStore, QueueEntry, QueueEntryPatch,
    QueueSnapshot,
};

use crate::config::SyncConfig;

/// Storage key of the pending entries.
pub const QUEUE_KEY: &str = "tripsync.queue";

/// Storage key of the conflict archive.
pub const CONFLICTS_KEY: &str = "tripsync.conflicts";

struct QueueState {
    entries: Vec<QueueEntry>,
    conflicts: Vec<ConflictBackupEntry>,
}

/// Handle to the offline queue. Clones share state.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    tx: watch::Sender<QueueSnapshot>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn ClockSource>,
    capacity: usize,
    conflict_capacity: usize,
}

impl OfflineQueue {
    /// Opens the queue, loading whatever the store holds.
    ///
    /// Unreadable persisted data is logged and treated as empty.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn ClockSource>,
        config: &SyncConfig,
    ) -> Self {
        let entries: Vec<QueueEntry> = load_list(store.as_ref(), QUEUE_KEY);
        let conflicts: Vec<ConflictBackupEntry> = load_list(store.as_ref(), CONFLICTS_KEY);
        let (tx, _) = watch::channel(QueueSnapshot::from_entries(entries.clone()));

        OfflineQueue {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState { entries, conflicts }),
                tx,
                store,
                clock,
                capacity: config.queue_capacity.max(1),
                conflict_capacity: config.conflict_capacity,
            }),
        }
    }

    /// Queues a write, replacing any pending entry for the same entity.
    ///
    /// The new entry goes to the back with a fresh id and no attempts.
    pub fn enqueue(
        &self,
        entity_id: &str,
        snapshot: EntitySnapshot,
        aux_snapshot: Option<Value>,
        label: &str,
    ) -> QueueEntry {
        let entry = QueueEntry {
            id: uuid::Uuid::new_v4().to_string(),
            entity_id: entity_id.to_string(),
            snapshot,
            aux_snapshot,
            label: label.to_string(),
            queued_at: self.inner.clock.now(),
            attempt_count: 0,
            last_error: None,
        };

        let mut state = self.lock_state();
        let before = state.entries.len();
        state.entries.retain(|e| e.entity_id != entity_id);
        if state.entries.len() != before {
            tracing::debug!(entity_id, "replacing pending entry");
        }
        state.entries.push(entry.clone());

        let overflow = state.entries.len().saturating_sub(self.inner.capacity);
        if overflow > 0 {
            let evicted: Vec<QueueEntry> = state.entries.drain(..overflow).collect();
            for old in &evicted {
                tracing::warn!(
                    entry_id = %old.id,
                    entity_id = %old.entity_id,
                    "queue full, evicting oldest entry"
                );
            }
        }

        tracing::debug!(entry_id = %entry.id, entity_id, label, "queued write");
        self.commit_entries(&state);
        entry
    }

    /// Applies a partial update in place. Returns the updated entry, or
    /// `None` if the entry is gone.
    pub fn update(&self, entry_id: &str, patch: QueueEntryPatch) -> Option<QueueEntry> {
        let mut state = self.lock_state();
        let entry = state.entries.iter_mut().find(|e| e.id == entry_id)?;
        patch.apply(entry);
        let updated = entry.clone();
        self.commit_entries(&state);
        Some(updated)
    }

    /// Removes an entry. Returns false if it was already gone.
    pub fn remove(&self, entry_id: &str) -> bool {
        let mut state = self.lock_state();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != entry_id);
        if state.entries.len() == before {
            return false;
        }
        tracing::debug!(entry_id, "removed queue entry");
        self.commit_entries(&state);
        true
    }

    /// Zeroes the attempt counter of every entry at or above `max_attempts`.
    ///
    /// `last_error` is kept so the entries still read as failed. Returns the
    /// number of entries reset.
    pub fn reset_exhausted(&self, max_attempts: u32) -> usize {
        let mut state = self.lock_state();
        let mut reset = 0;
        for entry in state.entries.iter_mut().filter(|e| e.is_exhausted(max_attempts)) {
            entry.attempt_count = 0;
            reset += 1;
        }
        if reset > 0 {
            self.commit_entries(&state);
        }
        reset
    }

    pub fn entry(&self, entry_id: &str) -> Option<QueueEntry> {
        self.lock_state().entries.iter().find(|e| e.id == entry_id).cloned()
    }

    /// All pending entries in queue order.
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.lock_state().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Subscribes to queue changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Archives both sides of a replay that is about to overwrite a newer
    /// server copy.
    pub fn store_conflict_backup(
        &self,
        queue_entry_id: &str,
        server_snapshot: EntitySnapshot,
        queued_snapshot: EntitySnapshot,
    ) -> ConflictBackupEntry {
        let backup = ConflictBackupEntry {
            id: uuid::Uuid::new_v4().to_string(),
            queue_entry_id: queue_entry_id.to_string(),
            entity_id: queued_snapshot.id.clone(),
            server_snapshot,
            queued_snapshot,
            captured_at: self.inner.clock.now(),
        };

        let mut state = self.lock_state();
        state.conflicts.insert(0, backup.clone());
        state.conflicts.truncate(self.inner.conflict_capacity);
        persist_list(self.inner.store.as_ref(), CONFLICTS_KEY, &state.conflicts);
        backup
    }

    /// Conflict backups, newest first.
    pub fn conflict_backups(&self) -> Vec<ConflictBackupEntry> {
        self.lock_state().conflicts.clone()
    }

    pub fn latest_conflict_backup_for_entity(&self, entity_id: &str) -> Option<ConflictBackupEntry> {
        self.lock_state().conflicts.iter().find(|c| c.entity_id == entity_id).cloned()
    }

    pub fn has_conflict_backups(&self) -> bool {
        !self.lock_state().conflicts.is_empty()
    }

    pub fn clear_conflict_backups(&self) {
        let mut state = self.lock_state();
        state.conflicts.clear();
        persist_list(self.inner.store.as_ref(), CONFLICTS_KEY, &state.conflicts);
    }

    /// Persists the entries and republishes the snapshot.
    fn commit_entries(&self, state: &QueueState) {
        persist_list(self.inner.store.as_ref(), QUEUE_KEY, &state.entries);
        self.inner.tx.send_replace(QueueSnapshot::from_entries(state.entries.clone()));
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_list<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read persisted list");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding corrupt persisted list");
            Vec::new()
        }
    }
}

fn persist_list<T: Serialize>(store: &dyn KeyValueStore, key: &str, list: &[T]) {
    let json = match serde_json::to_string(list) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to serialize list");
            return;
        }
    };
    if let Err(e) = store.set(key, &json) {
        tracing::warn!(key, error = %e, "failed to persist list");
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
