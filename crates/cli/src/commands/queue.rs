// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::cli::OutputFormat;
use crate::display::format_entry;
use crate::error::Result;

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let snapshot = ctx.queue().snapshot();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text if snapshot.is_empty() => println!("Queue is empty"),
        OutputFormat::Text => {
            for entry in &snapshot.entries {
                println!("{}", format_entry(entry, ctx.config.max_attempts));
            }
        }
    }
    Ok(())
}
