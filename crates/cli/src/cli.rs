// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Examples:
  tsync status                  Show override, queue and conflict counts
  tsync force offline           Pretend the backend is unreachable
  tsync clear-override          Return to automatic detection
  tsync queue -f json           Dump pending writes as JSON";

#[derive(Parser)]
#[command(name = "tsync", version)]
#[command(about = "Inspect and steer the offline state of the trip sync engine")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Data directory holding the engine's persisted state
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the connectivity override, queue counts and conflict count
    Status {
        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Force the connectivity state until cleared
    #[command(arg_required_else_help = true)]
    Force {
        /// Mode to force (online, degraded, offline)
        mode: String,
    },

    /// Remove the connectivity override
    ClearOverride,

    /// List pending queue entries, oldest first
    Queue {
        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List conflict backups, newest first
    Conflicts {
        /// Only show backups for this entity
        #[arg(long, short)]
        entity: Option<String>,

        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Drop every conflict backup
    ClearConflicts,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
