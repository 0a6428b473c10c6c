// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync run progress as published to presentation layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What started a drain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// First decision after startup once the queue is non-empty and online.
    Bootstrap,
    /// Connectivity transitioned into online.
    ConnectivityRestored,
    /// Explicit "sync everything" call.
    Manual,
    /// Explicit "retry failed only" call.
    RetryFailed,
    /// Periodic background timer.
    Background,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncTrigger::Bootstrap => "bootstrap",
            SyncTrigger::ConnectivityRestored => "connectivity_restored",
            SyncTrigger::Manual => "manual",
            SyncTrigger::RetryFailed => "retry_failed",
            SyncTrigger::Background => "background",
        };
        f.write_str(s)
    }
}

/// Live and cumulative progress of the sync manager.
///
/// The `processing_*`, `processed_count`, `success_count` and
/// `failed_during_run` fields describe the current (or last) run;
/// `pending_count`/`failed_count` are recomputed from the queue after every step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncRunSnapshot {
    pub is_syncing: bool,
    pub pending_count: usize,
    pub failed_count: usize,
    pub processing_entry_id: Option<String>,
    pub processing_entity_id: Option<String>,
    pub processed_count: usize,
    pub success_count: usize,
    pub failed_during_run: usize,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_trigger: Option<SyncTrigger>,
    pub has_conflict_backups: bool,
}

/// Coarse run announcements for components that should not re-render on
/// every progress step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncToast {
    Started { trigger: SyncTrigger, pending: usize },
    Completed { synced: usize },
    PartialFailure { synced: usize, failed: usize, last_error: Option<String> },
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
