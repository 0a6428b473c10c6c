// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variables read by `tsync`.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `TSYNC_DATA_DIR` if set and non-empty.
pub fn data_dir() -> Option<PathBuf> {
    std::env::var(vars::TSYNC_DATA_DIR).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}
