// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::json;
use tripsync::{OfflineQueue, SyncConfig};
use ts_core::{EntitySnapshot, FileStore, SystemClock};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `tsync` pointed at `temp` with logging silenced.
pub fn tsync(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tsync");
    cmd.arg("--data-dir").arg(temp.path()).env_remove("TSYNC_LOG");
    cmd
}

/// Opens the queue the way the engine would, over the same directory.
pub fn open_queue(temp: &TempDir) -> OfflineQueue {
    let store = Arc::new(FileStore::open(temp.path()).unwrap());
    OfflineQueue::new(store, Arc::new(SystemClock), &SyncConfig::default())
}

pub fn trip(id: &str, updated_at: i64) -> EntitySnapshot {
    EntitySnapshot::new(id, updated_at, json!({"name": id}))
}
