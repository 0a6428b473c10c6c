// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted connectivity override.
//!
//! The override is a single key in the key-value store holding the forced
//! state name. The monitor reads it at startup and the debug CLI writes it
//! directly, so both go through this type.

use std::sync::Arc;

use ts_core::{ConnectivityState, KeyValueStore, Result};

/// Storage key of the forced connectivity state.
pub const OVERRIDE_KEY: &str = "tripsync.connectivity.override";

/// Reads and writes the forced connectivity state.
#[derive(Clone)]
pub struct OverrideFlag {
    store: Arc<dyn KeyValueStore>,
}

impl OverrideFlag {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        OverrideFlag { store }
    }

    /// Returns the persisted override, if any.
    ///
    /// An unreadable value is reported as an error rather than ignored so
    /// callers can decide whether to clear it.
    pub fn load(&self) -> Result<Option<ConnectivityState>> {
        match self.store.get(OVERRIDE_KEY)? {
            Some(raw) => Ok(Some(raw.parse()?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, state: ConnectivityState) -> Result<()> {
        self.store.set(OVERRIDE_KEY, state.as_str())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(OVERRIDE_KEY)
    }
}

#[cfg(test)]
#[path = "override_flag_tests.rs"]
mod tests;
