// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use ts_core::ConnectivityState;

use super::Context;
use crate::error::Result;

/// Persists `mode` as the connectivity override. Setting the current mode again succeeds.
pub fn force(ctx: &Context, mode: &str) -> Result<()> {
    let mode: ConnectivityState = mode.parse()?;
    ctx.overrides().save(mode)?;
    println!("Connectivity forced {mode}");
    Ok(())
}

pub fn clear(ctx: &Context) -> Result<()> {
    let overrides = ctx.overrides();
    // An unreadable value is still removed.
    let previous = overrides.load().ok().flatten();
    overrides.clear()?;
    match previous {
        Some(mode) => println!("Cleared override (was {mode})"),
        None => println!("No override set"),
    }
    Ok(())
}
