// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod conflicts;
pub mod overrides;
pub mod queue;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tripsync::{OfflineQueue, OverrideFlag, SyncConfig};
use ts_core::{FileStore, KeyValueStore, SystemClock};

use crate::error::Result;

/// Persisted engine state shared by every command.
pub struct Context {
    pub data_dir: PathBuf,
    pub store: Arc<dyn KeyValueStore>,
    pub config: SyncConfig,
}

impl Context {
    /// Opens the file-backed store at `data_dir` and its `tripsync.toml`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let store = FileStore::open(data_dir)?;
        let config = SyncConfig::load(data_dir)?;
        tracing::debug!(data_dir = %data_dir.display(), "opened data dir");
        Ok(Context { data_dir: data_dir.to_path_buf(), store: Arc::new(store), config })
    }

    pub fn queue(&self) -> OfflineQueue {
        OfflineQueue::new(self.store.clone(), Arc::new(SystemClock), &self.config)
    }

    pub fn overrides(&self) -> OverrideFlag {
        OverrideFlag::new(self.store.clone())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
