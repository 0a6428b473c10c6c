// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tripsync::CONFLICTS_KEY;
use ts_core::{ConflictBackupEntry, KeyValueStore};

use super::Context;
use crate::cli::OutputFormat;
use crate::display::format_backup;
use crate::error::Result;

/// Backups newest first, optionally limited to one entity.
pub fn list(ctx: &Context, entity: Option<&str>) -> Vec<ConflictBackupEntry> {
    let mut backups = ctx.queue().conflict_backups();
    if let Some(entity) = entity {
        backups.retain(|b| b.entity_id == entity);
    }
    backups
}

pub fn run(ctx: &Context, entity: Option<&str>, format: OutputFormat) -> Result<()> {
    let backups = list(ctx, entity);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&backups)?),
        OutputFormat::Text if backups.is_empty() => println!("No conflict backups"),
        OutputFormat::Text => {
            for backup in &backups {
                println!("{}", format_backup(backup));
            }
        }
    }
    Ok(())
}

/// Removes the archive directly so a failed write is reported.
pub fn clear(ctx: &Context) -> Result<()> {
    let count = ctx.queue().conflict_backups().len();
    ctx.store.remove(CONFLICTS_KEY)?;
    println!("Cleared {count} conflict backup(s)");
    Ok(())
}
