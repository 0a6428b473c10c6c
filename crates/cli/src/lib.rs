// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tsync - debug surface over the trip sync engine's persisted state.
//!
//! Reads and writes the same file-backed store the engine uses, so a
//! developer can force the connectivity override, inspect pending writes
//! and review conflict backups without running the app.

mod cli;
mod commands;
mod display;
pub mod env;
pub mod error;

use std::path::PathBuf;

pub use cli::{Cli, Command, OutputFormat};
pub use error::{Error, Result};

use commands::Context;

/// Directory name under the platform data dir.
const DEFAULT_DIR_NAME: &str = "tripsync";

/// Picks the data directory: the flag, then `TSYNC_DATA_DIR`, then the
/// platform's local data dir.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(env::data_dir)
        .or_else(|| dirs::data_local_dir().map(|d| d.join(DEFAULT_DIR_NAME)))
        .ok_or(Error::DataDirUnavailable)
}

pub fn run(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    let ctx = Context::open(&data_dir)?;

    match cli.command {
        Command::Status { format } => commands::status::run(&ctx, format),
        Command::Force { mode } => commands::overrides::force(&ctx, &mode),
        Command::ClearOverride => commands::overrides::clear(&ctx),
        Command::Queue { format } => commands::queue::run(&ctx, format),
        Command::Conflicts { entity, format } => {
            commands::conflicts::run(&ctx, entity.as_deref(), format)
        }
        Command::ClearConflicts => commands::conflicts::clear(&ctx),
    }
}
