// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text rendering for command output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_core::{ConflictBackupEntry, ConnectivityState, QueueEntry};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Summary printed by `tsync status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub data_dir: String,
    #[serde(rename = "override")]
    pub forced: Option<ConnectivityState>,
    pub pending_count: usize,
    pub failed_count: usize,
    pub exhausted_count: usize,
    pub conflict_count: usize,
}

pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

pub fn format_status(report: &StatusReport) -> String {
    let forced = match report.forced {
        Some(mode) => format!("forced {mode}"),
        None => "none (automatic)".to_string(),
    };
    format!(
        "data dir:  {}\noverride:  {}\nqueue:     {} pending, {} failed, {} exhausted\nconflicts: {}",
        report.data_dir,
        forced,
        report.pending_count,
        report.failed_count,
        report.exhausted_count,
        report.conflict_count,
    )
}

/// One line per entry, plus an indented error line for failed entries.
pub fn format_entry(entry: &QueueEntry, max_attempts: u32) -> String {
    let mut line = format!(
        "{}  {}  attempts={}/{}  queued {}",
        entry.entity_id,
        entry.label,
        entry.attempt_count,
        max_attempts,
        format_time(&entry.queued_at),
    );
    if entry.is_exhausted(max_attempts) {
        line.push_str("  (exhausted)");
    }
    if let Some(error) = &entry.last_error {
        line.push_str("\n    error: ");
        line.push_str(error);
    }
    line
}

pub fn format_backup(backup: &ConflictBackupEntry) -> String {
    format!(
        "{}  server@{}  queued@{}  captured {}",
        backup.entity_id,
        backup.server_snapshot.updated_at,
        backup.queued_snapshot.updated_at,
        format_time(&backup.captured_at),
    )
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
