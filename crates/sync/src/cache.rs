// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local copy of reconciled entities.
//!
//! After a successful replay the written snapshot is stored here, and after a
//! full drain the cache is replaced by the remote list. Each entity lives
//! under its own key; a separate index key lists the cached ids.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use ts_core::{EntitySnapshot, Error, KeyValueStore, Result};

const ENTITY_KEY_PREFIX: &str = "tripsync.entity.";
const INDEX_KEY: &str = "tripsync.entities";

fn entity_key(entity_id: &str) -> String {
    format!("{ENTITY_KEY_PREFIX}{entity_id}")
}

/// Reconciled entity store.
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn KeyValueStore>,
    // Serializes index read-modify-write cycles.
    index_lock: Arc<Mutex<()>>,
}

impl EntityCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        EntityCache { store, index_lock: Arc::new(Mutex::new(())) }
    }

    /// Stores a snapshot that the remote store has accepted.
    pub fn store_reconciled(&self, snapshot: &EntitySnapshot) -> Result<()> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store.set(&entity_key(&snapshot.id), &serde_json::to_string(snapshot)?)?;
        let mut index = self.load_index()?;
        if index.insert(snapshot.id.clone()) {
            self.save_index(&index)?;
        }
        Ok(())
    }

    /// Replaces the whole cache with `entities`.
    ///
    /// Entities absent from the new list are dropped.
    pub fn replace_all(&self, entities: &[EntitySnapshot]) -> Result<()> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.load_index()?;
        let mut index = BTreeSet::new();
        for snapshot in entities {
            self.store.set(&entity_key(&snapshot.id), &serde_json::to_string(snapshot)?)?;
            index.insert(snapshot.id.clone());
        }
        for stale in previous.difference(&index) {
            self.store.remove(&entity_key(stale))?;
        }
        self.save_index(&index)?;
        tracing::debug!(count = index.len(), "entity cache replaced");
        Ok(())
    }

    pub fn get(&self, entity_id: &str) -> Result<Option<EntitySnapshot>> {
        match self.store.get(&entity_key(entity_id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every cached entity, ordered by id.
    pub fn list(&self) -> Result<Vec<EntitySnapshot>> {
        let index = self.load_index()?;
        let mut entities = Vec::with_capacity(index.len());
        for id in &index {
            match self.get(id)? {
                Some(snapshot) => entities.push(snapshot),
                None => {
                    return Err(Error::CorruptedData(format!(
                        "entity index lists {id} but no snapshot is stored"
                    )))
                }
            }
        }
        Ok(entities)
    }

    pub fn is_reconciled(&self, entity_id: &str) -> Result<bool> {
        Ok(self.load_index()?.contains(entity_id))
    }

    fn load_index(&self) -> Result<BTreeSet<String>> {
        match self.store.get(INDEX_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn save_index(&self, index: &BTreeSet<String>) -> Result<()> {
        self.store.set(INDEX_KEY, &serde_json::to_string(index)?)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
