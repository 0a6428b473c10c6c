// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ts-core operations.

use thiserror::Error;

/// All possible errors that can occur in ts-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid connectivity mode: '{0}'\n  hint: valid modes are: online, degraded, offline")]
    InvalidMode(String),

    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for ts-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
