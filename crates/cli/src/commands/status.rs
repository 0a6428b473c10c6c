// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::cli::OutputFormat;
use crate::display::{format_status, StatusReport};
use crate::error::Result;

pub fn report(ctx: &Context) -> Result<StatusReport> {
    let queue = ctx.queue();
    let snapshot = queue.snapshot();
    let exhausted_count =
        snapshot.entries.iter().filter(|e| e.is_exhausted(ctx.config.max_attempts)).count();

    Ok(StatusReport {
        data_dir: ctx.data_dir.display().to_string(),
        forced: ctx.overrides().load()?,
        pending_count: snapshot.pending_count,
        failed_count: snapshot.failed_count,
        exhausted_count,
        conflict_count: queue.conflict_backups().len(),
    })
}

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let report = report(ctx)?;
    match format {
        OutputFormat::Text => println!("{}", format_status(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
