// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by `tsync` commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ts_core::Error),

    #[error(transparent)]
    Config(#[from] tripsync::ConfigError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data directory available\n  hint: pass --data-dir or set TSYNC_DATA_DIR")]
    DataDirUnavailable,
}

pub type Result<T> = std::result::Result<T, Error>;
